//! Work through the queued contact persons and deactivate each one in Momentum.

use tracing::{error, info, warn};

use crate::{
    PROCESS_NAME, PhaseError,
    ats::Workqueue,
    momentum::{CompanyDirectory, MomentumError},
    tracking::Tracker,
};

/// Process the workqueue until it is drained.
///
/// Items are claimed and handled strictly one at a time, in queue order. A
/// business rejection fails the affected item and processing continues; any
/// other error aborts the whole phase with the current item left unresolved.
pub async fn process_workqueue(
    workqueue: &impl Workqueue,
    momentum: &impl CompanyDirectory,
    tracker: &impl Tracker,
) -> Result<(), PhaseError> {
    info!("Starting to process the workqueue.");

    while let Some(item) = workqueue.next_item().await? {
        let data = &item.data;
        info!(
            "Processing contact person: {} (ID: {})",
            data.name.as_deref().unwrap_or("<unnamed>"),
            data.id
        );
        match momentum.set_contact_person_active(&data.id, false).await {
            Ok(true) => {
                info!(
                    "Successfully deactivated contact person: {}",
                    data.name.as_deref().unwrap_or("<unnamed>")
                );
                tracker.track_task(PROCESS_NAME).await?;
                workqueue.complete_item(&item.id).await?;
            }
            Ok(false) => {
                // Momentum did not apply the change, but without a fault. The
                // item is not failed, only logged.
                warn!(
                    "Failed to deactivate contact person: {}",
                    data.name.as_deref().unwrap_or("<unnamed>")
                );
                workqueue.complete_item(&item.id).await?;
            }
            Err(MomentumError::Business(message)) => {
                error!("Error processing item {data:?}: {message}");
                workqueue.fail_item(&item.id, &message).await?;
            }
            Err(e) => {
                error!("Unexpected error processing item {data:?}: {e}");
                return Err(e.into());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;
    use crate::ats::{AtsError, WorkItem, WorkItemData};
    use crate::tracking::TrackingError;
    use crate::{CaseHandler, ContactPerson};

    struct FakeWorkqueue {
        items: Mutex<VecDeque<WorkItem>>,
        completed: Mutex<Vec<String>>,
        failed: Mutex<Vec<(String, String)>>,
    }
    impl FakeWorkqueue {
        fn with_items(items: Vec<WorkItem>) -> Self {
            Self {
                items: Mutex::new(items.into()),
                completed: Mutex::new(Vec::new()),
                failed: Mutex::new(Vec::new()),
            }
        }
    }
    impl Workqueue for FakeWorkqueue {
        async fn clear(&self, _status: &str) -> Result<(), AtsError> {
            Ok(())
        }
        async fn add_item(
            &self,
            _data: &WorkItemData,
            _reference: Option<&str>,
        ) -> Result<(), AtsError> {
            Ok(())
        }
        async fn next_item(&self) -> Result<Option<WorkItem>, AtsError> {
            Ok(self.items.lock().expect("no poisoned lock in tests").pop_front())
        }
        async fn complete_item(&self, item_id: &str) -> Result<(), AtsError> {
            self.completed
                .lock()
                .expect("no poisoned lock in tests")
                .push(item_id.to_string());
            Ok(())
        }
        async fn fail_item(&self, item_id: &str, message: &str) -> Result<(), AtsError> {
            self.failed
                .lock()
                .expect("no poisoned lock in tests")
                .push((item_id.to_string(), message.to_string()));
            Ok(())
        }
    }

    enum StatusOutcome {
        Applied,
        Rejected,
        Business(&'static str),
        Broken,
    }

    struct FakeMomentum {
        outcomes: Mutex<HashMap<String, StatusOutcome>>,
        calls: Mutex<Vec<String>>,
    }
    impl FakeMomentum {
        fn new<const N: usize>(outcomes: [(&str, StatusOutcome); N]) -> Self {
            Self {
                outcomes: Mutex::new(
                    outcomes
                        .into_iter()
                        .map(|(id, outcome)| (id.to_string(), outcome))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }
    }
    impl CompanyDirectory for FakeMomentum {
        async fn case_handlers(
            &self,
            _company_id: &str,
        ) -> Result<Vec<CaseHandler>, MomentumError> {
            Ok(Vec::new())
        }
        async fn contact_persons(
            &self,
            _company_id: &str,
        ) -> Result<Vec<ContactPerson>, MomentumError> {
            Ok(Vec::new())
        }
        async fn set_contact_person_active(
            &self,
            contact_person_id: &str,
            _active: bool,
        ) -> Result<bool, MomentumError> {
            self.calls
                .lock()
                .expect("no poisoned lock in tests")
                .push(contact_person_id.to_string());
            match self
                .outcomes
                .lock()
                .expect("no poisoned lock in tests")
                .remove(contact_person_id)
            {
                Some(StatusOutcome::Applied) | None => Ok(true),
                Some(StatusOutcome::Rejected) => Ok(false),
                Some(StatusOutcome::Business(message)) => {
                    Err(MomentumError::Business(message.to_string()))
                }
                Some(StatusOutcome::Broken) => Err(MomentumError::Deserialize),
            }
        }
    }

    #[derive(Default)]
    struct FakeTracker {
        tracked: Mutex<Vec<String>>,
    }
    impl Tracker for FakeTracker {
        async fn track_task(&self, process_name: &str) -> Result<(), TrackingError> {
            self.tracked
                .lock()
                .expect("no poisoned lock in tests")
                .push(process_name.to_string());
            Ok(())
        }
    }

    fn item(item_id: &str, contact_id: &str, name: &str) -> WorkItem {
        WorkItem {
            id: item_id.to_string(),
            data: WorkItemData {
                name: Some(name.to_string()),
                id: contact_id.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn successful_deactivation_tracks_once_and_completes_the_item() {
        let workqueue = FakeWorkqueue::with_items(vec![item("wi-1", "c-1", "Anna")]);
        let momentum = FakeMomentum::new([("c-1", StatusOutcome::Applied)]);
        let tracker = FakeTracker::default();

        process_workqueue(&workqueue, &momentum, &tracker)
            .await
            .expect("processing succeeds");

        assert_eq!(
            *tracker.tracked.lock().expect("no poisoned lock in tests"),
            vec![PROCESS_NAME.to_string()]
        );
        assert_eq!(
            *workqueue.completed.lock().expect("no poisoned lock in tests"),
            vec!["wi-1".to_string()]
        );
        assert!(workqueue.failed.lock().expect("no poisoned lock in tests").is_empty());
    }

    #[tokio::test]
    async fn rejected_deactivation_completes_the_item_without_tracking() {
        let workqueue = FakeWorkqueue::with_items(vec![item("wi-1", "c-1", "Anna")]);
        let momentum = FakeMomentum::new([("c-1", StatusOutcome::Rejected)]);
        let tracker = FakeTracker::default();

        process_workqueue(&workqueue, &momentum, &tracker)
            .await
            .expect("processing succeeds");

        assert!(tracker.tracked.lock().expect("no poisoned lock in tests").is_empty());
        assert_eq!(
            *workqueue.completed.lock().expect("no poisoned lock in tests"),
            vec!["wi-1".to_string()]
        );
        assert!(workqueue.failed.lock().expect("no poisoned lock in tests").is_empty());
    }

    #[tokio::test]
    async fn business_error_fails_the_item_and_continues() {
        let workqueue = FakeWorkqueue::with_items(vec![
            item("wi-1", "c-1", "Anna"),
            item("wi-2", "c-2", "Bob"),
        ]);
        let momentum = FakeMomentum::new([
            ("c-1", StatusOutcome::Business("Kontaktpersonen er låst")),
            ("c-2", StatusOutcome::Applied),
        ]);
        let tracker = FakeTracker::default();

        process_workqueue(&workqueue, &momentum, &tracker)
            .await
            .expect("one failed item does not abort the run");

        assert_eq!(
            *workqueue.failed.lock().expect("no poisoned lock in tests"),
            vec![("wi-1".to_string(), "Kontaktpersonen er låst".to_string())]
        );
        assert_eq!(
            *workqueue.completed.lock().expect("no poisoned lock in tests"),
            vec!["wi-2".to_string()]
        );
        assert_eq!(
            *momentum.calls.lock().expect("no poisoned lock in tests"),
            vec!["c-1".to_string(), "c-2".to_string()]
        );
        assert_eq!(tracker.tracked.lock().expect("no poisoned lock in tests").len(), 1);
    }

    #[tokio::test]
    async fn unexpected_error_aborts_the_run() {
        let workqueue = FakeWorkqueue::with_items(vec![
            item("wi-1", "c-1", "Anna"),
            item("wi-2", "c-2", "Bob"),
        ]);
        let momentum = FakeMomentum::new([("c-1", StatusOutcome::Broken)]);
        let tracker = FakeTracker::default();

        let result = process_workqueue(&workqueue, &momentum, &tracker).await;

        assert!(result.is_err());
        // the second item must not have been touched
        assert_eq!(
            *momentum.calls.lock().expect("no poisoned lock in tests"),
            vec!["c-1".to_string()]
        );
        assert!(workqueue.completed.lock().expect("no poisoned lock in tests").is_empty());
        assert!(workqueue.failed.lock().expect("no poisoned lock in tests").is_empty());
        assert!(tracker.tracked.lock().expect("no poisoned lock in tests").is_empty());
    }
}
