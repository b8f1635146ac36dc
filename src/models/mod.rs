pub mod notification;

pub use notification::{
    CreateNotification, DeliveryStatus, FailedDelivery, Notification, NotificationFilter,
    NotificationKind, NotificationStats,
};
