pub mod appointment;
pub mod hours;
pub mod salon;
pub mod service;
pub mod slot;
pub mod staff;

pub use appointment::{Appointment, AppointmentStatus, PaymentStatus};
pub use hours::BusinessHours;
pub use salon::Salon;
pub use service::Service;
pub use slot::Slot;
pub use staff::Staff;
