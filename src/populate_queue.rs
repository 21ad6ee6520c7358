//! Fill the workqueue with the contact persons that should be deactivated.

use itertools::Itertools;
use tracing::info;

use crate::{
    CASE_HANDLER_ROLE_CODE, CaseHandler, ContactPerson, ORGANIZATION_ID, PhaseError,
    ats::{WorkItemData, Workqueue},
    momentum::CompanyDirectory,
};

/// Fetch the companys case handlers and contact persons from Momentum and
/// enqueue one work item per contact person that is not also a case handler.
pub async fn populate_queue(
    workqueue: &impl Workqueue,
    momentum: &impl CompanyDirectory,
) -> Result<(), PhaseError> {
    info!("Starting to populate the workqueue.");

    let case_handlers = momentum.case_handlers(ORGANIZATION_ID).await?;
    let contact_persons = momentum.contact_persons(ORGANIZATION_ID).await?;

    for contact in contacts_to_enqueue(&case_handlers, contact_persons) {
        let data = WorkItemData {
            name: contact.display_name,
            id: contact.id,
        };
        workqueue.add_item(&data, data.name.as_deref()).await?;
    }

    Ok(())
}

/// Select the contact persons that should end up in the queue.
///
/// Drops every contact that carries the case handler role, then every
/// remaining contact whose display name matches a case handlers display name.
/// Contacts without a display name cannot collide and stay in. Each contact
/// ID survives at most once.
fn contacts_to_enqueue(
    case_handlers: &[CaseHandler],
    contact_persons: Vec<ContactPerson>,
) -> Vec<ContactPerson> {
    contact_persons
        .into_iter()
        .filter(|contact| contact.contact_role_code.as_deref() != Some(CASE_HANDLER_ROLE_CODE))
        .filter(|contact| {
            let Some(name) = &contact.display_name else {
                return true;
            };
            let is_case_handler = case_handlers
                .iter()
                .any(|handler| handler.display_name.as_deref() == Some(name.as_str()));
            if is_case_handler {
                info!("Contact person {name} is also a case handler, skipping.");
            }
            !is_case_handler
        })
        .unique_by(|contact| contact.id.clone())
        .collect()
}
