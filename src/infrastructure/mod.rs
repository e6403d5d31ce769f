pub mod chrome_driver;
pub mod driver;

pub use chrome_driver::ChromeDriver;
pub use driver::{marker_present, wait_for_marker, wait_until, Waits, WizardDriver};
