use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    apply_patch, ensure_non_negative, ensure_not_blank, ensure_positive, new_id, now_rfc3339,
    ListParams, ListResult, Principal, ServiceError,
};
use garment_sql::SQLStore;
use garment_store::{begin, commit, table, Value};

use crate::integrity;
use crate::ledger::{self, Posting};
use crate::model::*;
use crate::schema::{BALANCES, ITEMS, MOVEMENTS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItem {
    pub code: String,
    pub name: String,
    pub category: ItemCategory,
    pub uom: String,
    #[serde(default)]
    pub reorder_level: Decimal,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilters {
    pub category: Option<ItemCategory>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilters {
    pub item_id: Option<String>,
    pub reference_id: Option<String>,
    pub kind: Option<MovementKind>,
    pub location: Option<String>,
}

/// A manual correction. `quantity` is the signed delta.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStock {
    pub item_id: String,
    #[serde(default = "main_location")]
    pub location: String,
    pub quantity: Decimal,
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStock {
    pub item_id: String,
    pub from_location: String,
    pub to_location: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

fn main_location() -> String {
    MAIN_LOCATION.to_string()
}

/// Items, balances and the stock ledger.
pub struct InventoryService {
    db: Arc<dyn SQLStore>,
}

impl InventoryService {
    pub fn new(db: Arc<dyn SQLStore>) -> Self {
        Self { db }
    }

    // ── Items ───────────────────────────────────────────────────────

    pub fn create_item(&self, input: CreateItem) -> Result<Item, ServiceError> {
        ensure_not_blank("code", &input.code)?;
        ensure_not_blank("name", &input.name)?;
        ensure_not_blank("uom", &input.uom)?;
        ensure_non_negative("reorderLevel", input.reorder_level)?;

        let now = now_rfc3339();
        let item = Item {
            id: new_id(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            category: input.category,
            uom: input.uom,
            reorder_level: input.reorder_level,
            attributes: input.attributes,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(self.db.as_ref(), ITEMS, &item.id, &item, &item_indexes(&item))
            .map_err(|e| match e {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict(format!("item code '{}' already exists", item.code))
                }
                other => other,
            })?;
        info!(code = %item.code, category = %item.category, "item created");
        Ok(item)
    }

    pub fn get_item(&self, id: &str) -> Result<Item, ServiceError> {
        table::get(self.db.as_ref(), ITEMS, id)
    }

    pub fn list_items(&self, filters: &ItemFilters, params: &ListParams) -> Result<ListResult<Item>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(c) = filters.category {
            conds.push(("category", Value::Text(c.to_string())));
        }
        if let Some(a) = filters.active {
            conds.push(("active", Value::Integer(a as i64)));
        }
        table::list(self.db.as_ref(), ITEMS, &conds, &["code", "name"], params)
    }

    /// Merge-patch an item. The code is immutable once stock references it.
    pub fn update_item(&self, id: &str, patch: serde_json::Value) -> Result<Item, ServiceError> {
        let current = self.get_item(id)?;
        let updated: Item = apply_patch(&current, patch, &["code"])?;
        ensure_not_blank("name", &updated.name)?;
        ensure_non_negative("reorderLevel", updated.reorder_level)?;
        table::update(self.db.as_ref(), ITEMS, id, &updated, &item_indexes(&updated))?;
        Ok(updated)
    }

    /// Items with stock history can only be deactivated.
    pub fn delete_item(&self, id: &str) -> Result<(), ServiceError> {
        let item = self.get_item(id)?;
        let used = table::count(self.db.as_ref(), MOVEMENTS, &[("item_id", Value::Text(item.id.clone()))])?;
        if used > 0 {
            return Err(ServiceError::InvalidState(format!(
                "item {} has {used} stock movements; deactivate it instead",
                item.code
            )));
        }
        table::delete(self.db.as_ref(), ITEMS, id)?;
        info!(code = %item.code, "item deleted");
        Ok(())
    }

    // ── Stock ───────────────────────────────────────────────────────

    pub fn item_stock(&self, id: &str) -> Result<ItemStock, ServiceError> {
        let item = self.get_item(id)?;
        let balances: Vec<StockBalance> =
            table::select(self.db.as_ref(), BALANCES, &[("item_id", Value::Text(item.id.clone()))])?;
        let total = balances.iter().map(|b| b.on_hand).sum();
        Ok(ItemStock { item, balances, total })
    }

    pub fn list_balances(
        &self,
        location: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<StockBalance>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(loc) = location {
            conds.push(("location", Value::Text(loc.to_string())));
        }
        table::list(self.db.as_ref(), BALANCES, &conds, &[], params)
    }

    pub fn list_movements(
        &self,
        filters: &MovementFilters,
        params: &ListParams,
    ) -> Result<ListResult<StockMovement>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(item) = &filters.item_id {
            conds.push(("item_id", Value::Text(item.clone())));
        }
        if let Some(r) = &filters.reference_id {
            conds.push(("reference_id", Value::Text(r.clone())));
        }
        if let Some(k) = filters.kind {
            conds.push(("kind", Value::Text(k.to_string())));
        }
        if let Some(loc) = &filters.location {
            conds.push(("location", Value::Text(loc.clone())));
        }
        table::list(self.db.as_ref(), MOVEMENTS, &conds, &[], params)
    }

    pub fn adjust(&self, input: AdjustStock, actor: &Principal) -> Result<StockMovement, ServiceError> {
        ensure_not_blank("note", &input.note)?;
        let tx = begin(self.db.as_ref())?;
        let movement = ledger::post_movement(
            &*tx,
            Posting {
                item_id: &input.item_id,
                location: &input.location,
                quantity: input.quantity,
                kind: MovementKind::Adjustment,
                reference: None,
                note: Some(input.note.clone()),
            },
            actor,
        )?;
        commit(tx)?;
        info!(
            item = %movement.item_code,
            location = %movement.location,
            quantity = %movement.quantity,
            actor = %actor.user_id,
            "stock adjusted"
        );
        Ok(movement)
    }

    /// Move stock between locations. Both legs post or neither does.
    pub fn transfer(&self, input: TransferStock, actor: &Principal) -> Result<Vec<StockMovement>, ServiceError> {
        ensure_positive("quantity", input.quantity)?;
        if input.from_location == input.to_location {
            return Err(ServiceError::Validation("transfer source and destination are the same".into()));
        }
        let reference = Reference::new("transfer", &new_id(), "");

        let tx = begin(self.db.as_ref())?;
        let out = ledger::post_movement(
            &*tx,
            Posting {
                item_id: &input.item_id,
                location: &input.from_location,
                quantity: -input.quantity,
                kind: MovementKind::TransferOut,
                reference: Some(reference.clone()),
                note: input.note.clone(),
            },
            actor,
        )?;
        let inbound = ledger::post_movement(
            &*tx,
            Posting {
                item_id: &input.item_id,
                location: &input.to_location,
                quantity: input.quantity,
                kind: MovementKind::TransferIn,
                reference: Some(reference),
                note: input.note,
            },
            actor,
        )?;
        commit(tx)?;
        info!(
            item = %out.item_code,
            from = %out.location,
            to = %inbound.location,
            quantity = %input.quantity,
            "stock transferred"
        );
        Ok(vec![out, inbound])
    }

    /// Active items whose usable stock (everything outside quarantine) is
    /// below their reorder level.
    pub fn low_stock(&self) -> Result<Vec<LowStockLine>, ServiceError> {
        let items: Vec<Item> = table::select(self.db.as_ref(), ITEMS, &[("active", Value::Integer(1))])?;
        let balances: Vec<StockBalance> = table::select(self.db.as_ref(), BALANCES, &[])?;

        let mut usable: HashMap<&str, Decimal> = HashMap::new();
        for b in balances.iter().filter(|b| b.location != QUARANTINE_LOCATION) {
            *usable.entry(b.item_id.as_str()).or_default() += b.on_hand;
        }

        let mut lines: Vec<LowStockLine> = items
            .into_iter()
            .filter(|i| i.reorder_level > Decimal::ZERO)
            .filter_map(|i| {
                let on_hand = usable.get(i.id.as_str()).copied().unwrap_or_default();
                (on_hand < i.reorder_level).then(|| LowStockLine {
                    shortfall: i.reorder_level - on_hand,
                    item_id: i.id,
                    code: i.code,
                    name: i.name,
                    on_hand,
                    reorder_level: i.reorder_level,
                })
            })
            .collect();
        lines.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(lines)
    }

    pub fn summary(&self) -> Result<InventorySummary, ServiceError> {
        let db = self.db.as_ref();
        let locations: BTreeSet<String> = table::count_by(db, BALANCES, "location")?
            .into_iter()
            .map(|(loc, _)| loc)
            .collect();
        Ok(InventorySummary {
            items: table::count(db, ITEMS, &[])?,
            active_items: table::count(db, ITEMS, &[("active", Value::Integer(1))])?,
            locations: locations.into_iter().collect(),
            low_stock: self.low_stock()?.len(),
            movements_by_kind: table::count_by(db, MOVEMENTS, "kind")?,
        })
    }

    /// Rewrite every balance that disagrees with its ledger.
    pub fn recompute_balances(&self) -> Result<Vec<BalanceFix>, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let fixes = integrity::recompute_balances(&*tx)?;
        commit(tx)?;
        for f in &fixes {
            info!(item = %f.item_id, location = %f.location, recorded = %f.recorded, ledger = %f.ledger, "balance recomputed");
        }
        Ok(fixes)
    }
}

fn item_indexes(item: &Item) -> Vec<(&'static str, Value)> {
    vec![
        ("code", Value::Text(item.code.clone())),
        ("name", Value::Text(item.name.clone())),
        ("category", Value::Text(item.category.to_string())),
        ("active", Value::Integer(item.active as i64)),
    ]
}
