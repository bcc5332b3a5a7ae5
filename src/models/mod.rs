pub mod booking;
pub mod category;
pub mod notification;
pub mod payment;
pub mod review;
pub mod schedule;
pub mod user;

pub use booking::{Booking, BookingStatus, PaymentStatus};
pub use category::Category;
pub use notification::Notification;
pub use payment::{Payment, PaymentMethod, PaymentRecordStatus};
pub use review::Review;
pub use schedule::{WeeklySchedule, WorkingSlot};
pub use user::{ApprovalStatus, ArtistProfile, Role, User, UserId};
