pub mod invoice;
pub mod order;
pub mod sync;
pub mod webhook;

pub use invoice::{FileType, InvoiceRecord};
pub use order::{CallRequest, Customer, Order, OrderStatus};
pub use sync::{EntityType, Operation, SyncTask, TaskPayload, TaskStatus};
pub use webhook::{WebhookData, WebhookEvent};
