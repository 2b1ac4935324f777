pub mod block;
pub mod config;
pub mod run;
pub mod status;

use agendatimer_core::alerts::{NoNotifications, SilentAlerts};
use agendatimer_core::countdown::ManualDriver;
use agendatimer_core::mirror::NoMirror;
use agendatimer_core::{Config, Database, EngineServices, SessionController, SystemClock};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// A session over the stored queue with no live countdown.
///
/// One-shot commands only edit or inspect the queue, so the driver never
/// fires and alerts go nowhere.
pub fn offline_session() -> Result<SessionController<NoMirror>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let services = EngineServices {
        clock: Box::new(SystemClock),
        driver: Box::new(ManualDriver::new()),
        alerts: Box::new(SilentAlerts),
        notifier: Box::new(NoNotifications),
    };
    Ok(SessionController::new(Box::new(db), services, &config, NoMirror))
}
