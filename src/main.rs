use std::str::FromStr;

use clap::Parser;

use ats::{AtsError, Workqueue};
use momentum::MomentumError;
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};
use tracing_subscriber::{filter, fmt::format::FmtSpan};
use tracking::TrackingError;

mod ats;
mod config;
mod momentum;
mod populate_queue;
mod process_queue;
mod tracking;

/// The company whose contact persons are cleaned up.
const ORGANIZATION_ID: &str = "4224e7fb-40c9-409c-938e-8aae62d5d753";
/// Contact role code that marks a contact person as a case handler.
const CASE_HANDLER_ROLE_CODE: &str = "057CBDC6-155E-45F8-BE9A-6E10A7C63906";
/// Name of the Momentum credential in the automation servers credential store.
const MOMENTUM_CREDENTIAL_NAME: &str = "Momentum - produktion";
/// Name of the tracking service credential in the automation servers credential store.
const TRACKING_CREDENTIAL_NAME: &str = "Tracking - produktion";
/// Process name under which completed deactivations are recorded in the tracking service.
const PROCESS_NAME: &str = "Opdatering af kontaktpersoner i Momentum på virksomhedens p-nummer";

/// A contact person listed on a company in Momentum
#[derive(Debug, Clone, PartialEq)]
pub struct ContactPerson {
    /// The ID of this contact person. This is the ID the status-change endpoint expects.
    pub id: String,
    /// Display name as shown in Momentum. Not guaranteed to be set.
    pub display_name: Option<String>,
    /// Code of the role this contact person has on the company, if any.
    pub contact_role_code: Option<String>,
}

/// A case handler assigned to a company in Momentum
#[derive(Debug, Clone, PartialEq)]
pub struct CaseHandler {
    /// Display name as shown in Momentum. Not guaranteed to be set.
    pub display_name: Option<String>,
}

/// Something went wrong while running one of the two phases
#[derive(Debug)]
pub enum PhaseError {
    Ats(AtsError),
    Momentum(MomentumError),
    Tracking(TrackingError),
}
impl core::fmt::Display for PhaseError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Ats(x) => write!(f, "AtsError: {x}"),
            Self::Momentum(x) => write!(f, "MomentumError: {x}"),
            Self::Tracking(x) => write!(f, "TrackingError: {x}"),
        }
    }
}
impl core::error::Error for PhaseError {}
impl From<AtsError> for PhaseError {
    fn from(value: AtsError) -> Self {
        Self::Ats(value)
    }
}
impl From<MomentumError> for PhaseError {
    fn from(value: MomentumError) -> Self {
        Self::Momentum(value)
    }
}
impl From<TrackingError> for PhaseError {
    fn from(value: TrackingError) -> Self {
        Self::Tracking(value)
    }
}

/// Deactivate a companys contact persons in Momentum via the workqueue.
#[derive(Debug, Parser)]
struct Cli {
    /// Clear the workqueue and repopulate it instead of processing it
    #[arg(long)]
    queue: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = config::Config::create()?;

    // Setup tracing
    let my_crate_filter = EnvFilter::new("momentum_contact_cleanup");
    let level_filter = filter::LevelFilter::from_str(&config.global.log_level)?;
    let subscriber = tracing_subscriber::registry().with(my_crate_filter).with(
        tracing_subscriber::fmt::layer()
            .compact()
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_line_number(true)
            .with_filter(level_filter),
    );
    tracing::subscriber::set_global_default(subscriber).expect("static tracing config");
    info!("Starting Momentum contact person cleanup. Got config and set up tracing.");

    let momentum_credential = ats::get_credential(&config, MOMENTUM_CREDENTIAL_NAME).await?;
    let momentum = momentum::create_client(momentum_credential).await?;
    let tracking_credential = ats::get_credential(&config, TRACKING_CREDENTIAL_NAME).await?;
    let tracker = tracking::TrackingClient::new(tracking_credential)?;

    let workqueue = ats::AtsWorkqueue::new(&config);

    // Queue management
    if cli.queue {
        workqueue.clear("new").await?;
        populate_queue::populate_queue(&workqueue, &momentum).await?;
        return Ok(());
    }

    // Process workqueue
    process_queue::process_workqueue(&workqueue, &momentum, &tracker).await?;

    Ok(())
}
