use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::model::{AnnotatedComment, Classification, RawComment, raw_fields_of};
use crate::normalize::Normalizer;

use super::week::{WeeklyBucket, parse_published_at};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WeeklyComment {
    pub(crate) id: String,
    pub(crate) week: WeeklyBucket,
    pub(crate) classification: Classification,
}

impl WeeklyComment {
    pub(crate) fn from_annotated(comment: &AnnotatedComment) -> Result<Self> {
        let published_at = parse_published_at(&comment.comment.published_at).with_context(|| {
            format!(
                "comment {} has an unparseable published_at: {:?}",
                comment.id(),
                comment.comment.published_at
            )
        })?;

        Ok(Self {
            id: comment.id().to_string(),
            week: WeeklyBucket::of(published_at),
            classification: comment.classification.clone(),
        })
    }
}

pub(crate) fn annotated_from_records(
    records: &[Value],
    normalizer: &Normalizer,
) -> Result<Vec<AnnotatedComment>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            annotated_from_record(record, normalizer)
                .with_context(|| format!("invalid annotated row {index}"))
        })
        .collect()
}

fn annotated_from_record(record: &Value, normalizer: &Normalizer) -> Result<AnnotatedComment> {
    let Some(fields) = raw_fields_of(record) else {
        bail!("annotated row is not an object");
    };
    let comment: RawComment = serde_json::from_value(Value::Object(fields))
        .context("annotated row does not match the comment schema")?;
    if comment.comment_id.is_empty() {
        bail!("annotated row has no comment_id");
    }
    if comment.published_at.trim().is_empty() {
        bail!("annotated row {} has no published_at", comment.comment_id);
    }

    Ok(AnnotatedComment::new(comment, normalizer.normalize(record)))
}
