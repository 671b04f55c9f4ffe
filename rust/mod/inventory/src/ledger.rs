//! The stock ledger.
//!
//! Balances are only ever changed here, and every change appends exactly one
//! movement. The functions take any [`Executor`] so procurement, manufacturing
//! and shipment post stock inside their own transactions.

use rust_decimal::Decimal;
use tracing::debug;

use garment_core::{ensure_not_blank, ensure_positive, new_id, now_rfc3339, Principal, ServiceError};
use garment_store::{table, Executor, Value};

use crate::model::{Item, MovementKind, Reference, StockBalance, StockMovement};
use crate::schema::{BALANCES, ITEMS, MOVEMENTS};

/// A single signed change to one (item, location) balance.
#[derive(Debug, Clone)]
pub struct Posting<'a> {
    pub item_id: &'a str,
    pub location: &'a str,
    pub quantity: Decimal,
    pub kind: MovementKind,
    pub reference: Option<Reference>,
    pub note: Option<String>,
}

fn balance_id(item_id: &str, location: &str) -> String {
    format!("{item_id}@{location}")
}

/// The recorded balance of an item at a location, if it was ever stocked there.
pub fn balance<E>(db: &E, item_id: &str, location: &str) -> Result<Option<StockBalance>, ServiceError>
where
    E: Executor + ?Sized,
{
    table::find(db, BALANCES, &balance_id(item_id, location))
}

/// On-hand quantity of an item at a location (zero when never stocked).
pub fn on_hand<E>(db: &E, item_id: &str, location: &str) -> Result<Decimal, ServiceError>
where
    E: Executor + ?Sized,
{
    Ok(balance(db, item_id, location)?.map(|b| b.on_hand).unwrap_or_default())
}

/// Apply a posting: update the balance and append its movement.
///
/// Fails with `VALIDATION_FAILED` when the balance would go negative or the
/// quantity's sign contradicts the movement kind.
pub fn post_movement<E>(db: &E, posting: Posting<'_>, actor: &Principal) -> Result<StockMovement, ServiceError>
where
    E: Executor + ?Sized,
{
    ensure_not_blank("location", posting.location)?;
    if posting.quantity.is_zero() {
        return Err(ServiceError::Validation("movement quantity cannot be zero".into()));
    }
    if let Some(inbound) = posting.kind.direction() {
        if inbound != (posting.quantity > Decimal::ZERO) {
            return Err(ServiceError::Validation(format!(
                "{} movements must be {}, got {}",
                posting.kind,
                if inbound { "positive" } else { "negative" },
                posting.quantity
            )));
        }
    }

    let item: Item = table::get(db, ITEMS, posting.item_id)?;
    let current = balance(db, &item.id, posting.location)?;
    let before = current.as_ref().map(|b| b.on_hand).unwrap_or_default();
    let after = before + posting.quantity;
    if after < Decimal::ZERO {
        return Err(ServiceError::Validation(format!(
            "insufficient stock of {} at {}: on hand {}, requested {}",
            item.code,
            posting.location,
            before,
            -posting.quantity
        )));
    }

    let now = now_rfc3339();
    let key = balance_id(&item.id, posting.location);
    let updated = StockBalance {
        item_id: item.id.clone(),
        location: posting.location.to_string(),
        on_hand: after,
        updated_at: now.clone(),
    };
    if current.is_some() {
        table::update(db, BALANCES, &key, &updated, &[])?;
    } else {
        table::insert(
            db,
            BALANCES,
            &key,
            &updated,
            &[
                ("item_id", Value::Text(item.id.clone())),
                ("location", Value::Text(updated.location.clone())),
            ],
        )?;
    }

    let movement = StockMovement {
        id: new_id(),
        item_id: item.id.clone(),
        item_code: item.code.clone(),
        location: posting.location.to_string(),
        quantity: posting.quantity,
        balance_after: after,
        kind: posting.kind,
        reference: posting.reference,
        note: posting.note,
        created_by: actor.user_id.clone(),
        created_at: now,
    };
    table::insert(
        db,
        MOVEMENTS,
        &movement.id,
        &movement,
        &[
            ("item_id", Value::Text(movement.item_id.clone())),
            ("location", Value::Text(movement.location.clone())),
            ("kind", Value::Text(movement.kind.to_string())),
            (
                "reference_id",
                Value::opt_text(movement.reference.as_ref().map(|r| r.id.as_str())),
            ),
        ],
    )?;

    debug!(
        item = %movement.item_code,
        location = %movement.location,
        kind = %movement.kind,
        quantity = %movement.quantity,
        balance = %after,
        "stock movement posted"
    );
    Ok(movement)
}

/// Post an inbound movement of a positive quantity.
pub fn receive<E>(
    db: &E,
    item_id: &str,
    location: &str,
    quantity: Decimal,
    kind: MovementKind,
    reference: Option<Reference>,
    actor: &Principal,
) -> Result<StockMovement, ServiceError>
where
    E: Executor + ?Sized,
{
    ensure_positive("quantity", quantity)?;
    post_movement(
        db,
        Posting { item_id, location, quantity, kind, reference, note: None },
        actor,
    )
}

/// Post an outbound movement of a positive quantity (stored negative).
pub fn issue<E>(
    db: &E,
    item_id: &str,
    location: &str,
    quantity: Decimal,
    kind: MovementKind,
    reference: Option<Reference>,
    actor: &Principal,
) -> Result<StockMovement, ServiceError>
where
    E: Executor + ?Sized,
{
    ensure_positive("quantity", quantity)?;
    post_movement(
        db,
        Posting { item_id, location, quantity: -quantity, kind, reference, note: None },
        actor,
    )
}

/// Movements posted for one document, oldest first.
pub fn movements_for<E>(db: &E, reference_id: &str) -> Result<Vec<StockMovement>, ServiceError>
where
    E: Executor + ?Sized,
{
    table::select(db, MOVEMENTS, &[("reference_id", Value::Text(reference_id.to_string()))])
}
