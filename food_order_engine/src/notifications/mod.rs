//! Best-effort notification fan-out.
//!
//! Every committed status change is pushed to real-time subscribers of the order's topic and the admin room, and a
//! transactional email is sent to the customer. The transport is abstracted by [`NotificationSink`]; the engine ships
//! with an in-process [`BroadcastNotificationSink`].
//!
//! Notification failures are logged and never propagate. By the time a notification is sent, the change it describes
//! has already been committed.
mod broadcast;
mod fanout;
mod sink;

pub use broadcast::{BroadcastNotificationSink, Notification};
pub use fanout::{NotificationFanout, ADMIN_ROOM, ORDER_CONFIRMATION_TEMPLATE, STATUS_UPDATE_TEMPLATE};
pub use sink::{NotificationError, NotificationSink};
