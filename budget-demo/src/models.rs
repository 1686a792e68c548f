//! The budget domain used throughout the engine's end-to-end scenarios:
//! [`BudgetItem`]/[`Budget`] (a to-many edge), and [`Transaction`], whose
//! `splits` are themselves transactions and which may carry a to-one
//! [`ActualItem`].
use chrono::{DateTime, FixedOffset};
use persist_engine::codec::{format_date, parse_date};
use persist_engine::error::EngineResult;
use persist_engine::{Cardinality, EdgeDescriptor, Persistable, Persister};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetItem {
    pub id: Option<i64>,
    pub label: String,
    pub budgeted: f64,
}

impl BudgetItem {
    pub fn new(label: impl Into<String>, budgeted: f64) -> Self {
        Self {
            id: None,
            label: label.into(),
            budgeted,
        }
    }
}

impl Persistable for BudgetItem {
    fn type_name() -> &'static str {
        "BudgetItem"
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_scalar_json(&self) -> EngineResult<JsonValue> {
        Ok(serde_json::json!({ "label": self.label, "budgeted": self.budgeted }))
    }

    fn from_scalar_json(id: i64, json: &JsonValue) -> EngineResult<Self> {
        Ok(Self {
            id: Some(id),
            label: json["label"].as_str().unwrap_or_default().to_string(),
            budgeted: json["budgeted"].as_f64().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    pub id: Option<i64>,
    pub date: DateTime<FixedOffset>,
    pub amount: f64,
    pub items: Vec<BudgetItem>,
}

impl Budget {
    pub fn new(date: DateTime<FixedOffset>, amount: f64) -> Self {
        Self {
            id: None,
            date,
            amount,
            items: Vec::new(),
        }
    }
}

impl Persistable for Budget {
    fn type_name() -> &'static str {
        "Budget"
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_scalar_json(&self) -> EngineResult<JsonValue> {
        Ok(serde_json::json!({ "date": format_date(&self.date), "amount": self.amount }))
    }

    fn from_scalar_json(id: i64, json: &JsonValue) -> EngineResult<Self> {
        let date = parse_date(json["date"].as_str().unwrap_or_default())?;
        Ok(Self {
            id: Some(id),
            date,
            amount: json["amount"].as_f64().unwrap_or_default(),
            items: Vec::new(),
        })
    }

    fn initialize(&mut self, engine: &Persister) -> EngineResult<()> {
        self.items = engine.related::<BudgetItem>(self.id, "items")?;
        Ok(())
    }

    fn save_related(&mut self, engine: &Persister, recurse: bool) -> EngineResult<()> {
        let id = self.id.expect("save_related runs after the vertex row is written");
        engine.save_relations(id, &mut self.items, "items", recurse)
    }

    fn delete_related(&self, engine: &Persister) -> EngineResult<()> {
        for item in &self.items {
            engine.delete_all(item)?;
        }
        Ok(())
    }

    fn edge_descriptors() -> Vec<EdgeDescriptor> {
        vec![EdgeDescriptor {
            property: "items",
            cardinality: Cardinality::Many,
            target_type: "BudgetItem",
        }]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActualItem {
    pub id: Option<i64>,
    pub amount: f64,
    pub memo: String,
    pub checkno: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl ActualItem {
    pub fn new(amount: f64, memo: impl Into<String>, checkno: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            id: None,
            amount,
            memo: memo.into(),
            checkno: checkno.into(),
            timestamp,
        }
    }
}

impl Persistable for ActualItem {
    fn type_name() -> &'static str {
        "ActualItem"
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_scalar_json(&self) -> EngineResult<JsonValue> {
        Ok(serde_json::json!({
            "amount": self.amount,
            "memo": self.memo,
            "checkno": self.checkno,
            "timestamp": format_date(&self.timestamp),
        }))
    }

    fn from_scalar_json(id: i64, json: &JsonValue) -> EngineResult<Self> {
        let timestamp = parse_date(json["timestamp"].as_str().unwrap_or_default())?;
        Ok(Self {
            id: Some(id),
            amount: json["amount"].as_f64().unwrap_or_default(),
            memo: json["memo"].as_str().unwrap_or_default().to_string(),
            checkno: json["checkno"].as_str().unwrap_or_default().to_string(),
            timestamp,
        })
    }
}

/// A transaction's splits are themselves transactions (spec.md §9's design
/// note: "a `Transaction` may appear as a split of another `Transaction`").
/// A split typically carries only an `amount` and, for the split actually
/// matched against a bank feed, an `actual_item` — `memo`/`checkno` default
/// to empty and `timestamp` to the Unix epoch when left unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub amount: f64,
    pub memo: String,
    pub checkno: String,
    pub timestamp: DateTime<FixedOffset>,
    pub splits: Vec<Transaction>,
    pub actual_item: Option<ActualItem>,
}

impl Transaction {
    pub fn new(amount: f64, memo: impl Into<String>, checkno: impl Into<String>, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            id: None,
            amount,
            memo: memo.into(),
            checkno: checkno.into(),
            timestamp,
            splits: Vec::new(),
            actual_item: None,
        }
    }

    /// A bare split: just an amount, no memo/checkno/timestamp of its own.
    pub fn split(amount: f64) -> Self {
        Self::new(amount, "", "", DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap().fixed_offset())
    }
}

impl Persistable for Transaction {
    fn type_name() -> &'static str {
        "Transaction"
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_scalar_json(&self) -> EngineResult<JsonValue> {
        Ok(serde_json::json!({
            "amount": self.amount,
            "memo": self.memo,
            "checkno": self.checkno,
            "timestamp": format_date(&self.timestamp),
        }))
    }

    fn from_scalar_json(id: i64, json: &JsonValue) -> EngineResult<Self> {
        let timestamp = parse_date(json["timestamp"].as_str().unwrap_or_default())?;
        Ok(Self {
            id: Some(id),
            amount: json["amount"].as_f64().unwrap_or_default(),
            memo: json["memo"].as_str().unwrap_or_default().to_string(),
            checkno: json["checkno"].as_str().unwrap_or_default().to_string(),
            timestamp,
            splits: Vec::new(),
            actual_item: None,
        })
    }

    fn initialize(&mut self, engine: &Persister) -> EngineResult<()> {
        self.splits = engine.related::<Transaction>(self.id, "splits")?;
        self.actual_item = engine.related_item::<ActualItem>(self.id, "actual_item")?;
        Ok(())
    }

    fn save_related(&mut self, engine: &Persister, recurse: bool) -> EngineResult<()> {
        let id = self.id.expect("save_related runs after the vertex row is written");
        engine.save_relations(id, &mut self.splits, "splits", recurse)?;
        engine.save_relation(id, &mut self.actual_item, "actual_item", recurse)
    }

    fn delete_related(&self, engine: &Persister) -> EngineResult<()> {
        for split in &self.splits {
            engine.delete_all(split)?;
        }
        if let Some(actual_item) = &self.actual_item {
            engine.delete_all(actual_item)?;
        }
        Ok(())
    }

    fn edge_descriptors() -> Vec<EdgeDescriptor> {
        vec![
            EdgeDescriptor {
                property: "splits",
                cardinality: Cardinality::Many,
                target_type: "Transaction",
            },
            EdgeDescriptor {
                property: "actual_item",
                cardinality: Cardinality::One,
                target_type: "ActualItem",
            },
        ]
    }
}
