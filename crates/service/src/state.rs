//! Order status state machine.
//!
//! PENDING is the initial status, CANCELLED the terminal one. Cancellation
//! eligibility depends on who is asking: users may only cancel orders that
//! are still PENDING, admins may also cancel PAID and PROCESSING orders. The
//! admin status-update path deliberately bypasses these checks.

use model::{OrderStatus, Role};

use crate::ServiceError;

/// Statuses a regular user may cancel an order from.
pub const USER_CANCELLABLE: &[OrderStatus] = &[OrderStatus::Pending];

/// Statuses an admin may cancel an order from.
pub const ADMIN_CANCELLABLE: &[OrderStatus] = &[
    OrderStatus::Pending,
    OrderStatus::Paid,
    OrderStatus::Processing,
];

/// The cancellation-eligible statuses for the given role.
pub fn cancellable_from(role: Role) -> &'static [OrderStatus] {
    match role {
        Role::User => USER_CANCELLABLE,
        Role::Admin => ADMIN_CANCELLABLE,
    }
}

/// Checks that an order in `current` status may be cancelled.
///
/// An already-cancelled order and an order past its cancellable stage produce
/// distinct conflicts so the caller can surface a stable message for each.
pub fn check_cancellable(
    current: OrderStatus,
    eligible: &[OrderStatus],
) -> Result<(), ServiceError> {
    if current == OrderStatus::Cancelled {
        return Err(ServiceError::Conflict("order already cancelled".into()));
    }
    if !eligible.contains(&current) {
        return Err(ServiceError::Conflict(
            "order cannot be cancelled at this stage".into(),
        ));
    }
    Ok(())
}
