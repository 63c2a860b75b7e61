use crate::domain::model::{Record, Rejection, TransformResult};
use async_trait::async_trait;

/// A single transformation applied to each record flowing through the
/// pipeline: clean a field, apply a business rule, filter, decorate.
///
/// Implementations mutate the record in place and must not retain it beyond
/// the call. Returning a `Rejection` drops the record from the pipeline.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Name used in logs and stamped onto rejections.
    fn name(&self) -> &str;

    async fn apply(&self, record: &mut Record) -> Result<(), Rejection>;
}

/// Adapter that lets a plain function serve as a [`Transform`].
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(&mut Record) -> Result<(), Rejection> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> Transform for FnTransform<F>
where
    F: Fn(&mut Record) -> Result<(), Rejection> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, record: &mut Record) -> Result<(), Rejection> {
        (self.f)(record)
    }
}

/// Ordered chain of transforms applied strictly sequentially to one record
/// at a time. The first rejection stops the chain: later transforms never
/// observe the record, and the partially-transformed value is dropped after
/// the rejection is reported.
pub struct TransformChain {
    transforms: Vec<Box<dyn Transform>>,
}

impl TransformChain {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }

    /// An empty chain accepts every record untouched.
    pub fn empty() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub async fn apply(&self, mut record: Record) -> Result<TransformResult, Rejection> {
        for transform in &self.transforms {
            if let Err(rejection) = transform.apply(&mut record).await {
                return Err(rejection.with_op(transform.name()));
            }
        }
        Ok(TransformResult::new(record))
    }
}

impl Default for TransformChain {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record_with_id(id: i64) -> Record {
        let mut record = Record::new();
        record.insert("id", json!(id));
        record
    }

    #[tokio::test]
    async fn test_empty_chain_accepts_record_untouched() {
        let chain = TransformChain::empty();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);

        let result = chain.apply(record_with_id(1)).await.unwrap();
        assert_eq!(result.record.get("id"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_transforms_apply_in_registration_order() {
        let chain = TransformChain::new(vec![
            Box::new(FnTransform::new("first", |record: &mut Record| {
                record.insert("trace", json!("first"));
                Ok(())
            })),
            Box::new(FnTransform::new("second", |record: &mut Record| {
                let seen = record.require_str("trace")?.to_string();
                record.insert("trace", json!(format!("{},second", seen)));
                Ok(())
            })),
        ]);

        assert_eq!(chain.names(), vec!["first", "second"]);

        let result = chain.apply(Record::new()).await.unwrap();
        assert_eq!(result.record.get("trace"), Some(&json!("first,second")));
    }

    #[tokio::test]
    async fn test_first_rejection_short_circuits() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&later_calls);

        let chain = TransformChain::new(vec![
            Box::new(FnTransform::new("gate", |_: &mut Record| {
                Err(Rejection::new("always"))
            })),
            Box::new(FnTransform::new("mutate", move |record: &mut Record| {
                calls.fetch_add(1, Ordering::SeqCst);
                record.insert("mutated", json!(true));
                Ok(())
            })),
        ]);

        let rejection = chain.apply(record_with_id(1)).await.unwrap_err();
        assert_eq!(rejection.op, "gate");
        assert_eq!(rejection.reason, "always");
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejection_carries_op_name() {
        let chain = TransformChain::new(vec![Box::new(FnTransform::new(
            "needs-id",
            |record: &mut Record| {
                record.require_f64("id")?;
                Ok(())
            },
        ))]);

        let rejection = chain.apply(Record::new()).await.unwrap_err();
        assert_eq!(rejection.op, "needs-id");
        assert!(rejection.reason.contains("missing"));
    }
}
