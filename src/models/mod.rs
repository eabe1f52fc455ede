pub mod event;
pub mod order;
pub mod payment;
pub mod promo_code;
pub mod ticket_instance;
pub mod ticket_type;

pub use event::Event;
pub use order::{Attendee, Order, OrderItem, OrderStatus};
pub use payment::{BillingMethod, Payment, PaymentStatus};
pub use promo_code::{DiscountKind, PromoCode};
pub use ticket_instance::{TicketInstance, TicketStatus};
pub use ticket_type::TicketType;
