use crate::error::{Result, StoreError};
use std::future::Future;

/// A step that finished, and how many records it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub affected: usize,
}

/// Runs a multi-step operation one step at a time. The store has no transaction that
/// spans collections, so a failed step leaves earlier steps in place and the error names
/// what already completed.
pub struct Saga {
    name: &'static str,
    completed: Vec<StepReport>,
}

impl Saga {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            completed: Vec::new(),
        }
    }

    pub async fn step<F>(&mut self, step: impl Into<String>, work: F) -> Result<usize>
    where
        F: Future<Output = Result<usize>>,
    {
        let step = step.into();
        match work.await {
            Ok(affected) => {
                self.completed.push(StepReport { step, affected });
                Ok(affected)
            }
            Err(source) => Err(StoreError::StepFailed {
                saga: self.name,
                step,
                completed: self.completed.iter().map(|r| r.step.clone()).collect(),
                source: Box::new(source),
            }),
        }
    }

    pub fn finish(self) -> Vec<StepReport> {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_names_completed_steps() {
        tokio_test::block_on(async {
            let mut saga = Saga::new("bootstrap");
            saga.step("first", async { Ok(2) }).await.unwrap();
            saga.step("second", async { Ok(0) }).await.unwrap();

            let err = saga
                .step("third", async { Err(StoreError::InvalidKey("x".into())) })
                .await
                .unwrap_err();

            match err {
                StoreError::StepFailed {
                    saga: name,
                    step,
                    completed,
                    source,
                } => {
                    assert_eq!(name, "bootstrap");
                    assert_eq!(step, "third");
                    assert_eq!(completed, vec!["first", "second"]);
                    assert!(matches!(*source, StoreError::InvalidKey(_)));
                }
                other => panic!("unexpected error: {other}"),
            }

            let report = saga.finish();
            assert_eq!(report.len(), 2);
            assert_eq!(report[0].affected, 2);
        });
    }
}
