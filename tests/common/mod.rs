//! Shared fixtures for the integration tests: a small domain model covering
//! every classification and container shape, plus stores that record or
//! fail lookups.

#![allow(dead_code)]

use async_trait::async_trait;
use datafold_mapper::{
    Annotation, Codec, CodecError, CodecRegistry, Document, DocumentStore, Entity, FieldDescriptor, Mapped,
    MappingBuilder, MemoryStore, RefId, Reference, StoreError,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("fixture documents are JSON objects")
}

// ========== Embedded types ==========

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: Option<String>,
}

impl Mapped for Address {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("street", |a| &a.street, |a| &mut a.street)
            .field("city", |a| &a.city, |a| &mut a.city)
            .field("zip", |a| &a.zip, |a| &mut a.zip)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Contact {
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub previous_addresses: Vec<Address>,
}

impl Mapped for Contact {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("email", |c| &c.email, |c| &mut c.email)
            .field("phone", |c| &c.phone, |c| &mut c.phone)
            .field("address", |c| &c.address, |c| &mut c.address)
            .with(Annotation::embed())
            .field("previous_addresses", |c| &c.previous_addresses, |c| &mut c.previous_addresses)
            .with(Annotation::embed_list())
    }
}

// ========== Entities ==========

#[derive(Debug, Default, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub age: i32,
    pub scores: Vec<f32>,
    pub permissions: HashMap<String, Vec<i32>>,
    pub contact: Contact,
    pub contacts_by_kind: BTreeMap<String, Contact>,
    pub address_history: HashMap<String, Vec<Address>>,
    pub profile: Value,
    pub session_token: String,
}

impl Mapped for User {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |u| &u.id, |u| &mut u.id)
            .with(Annotation::property())
            .with(Annotation::Id)
            .field("user_name", |u| &u.user_name, |u| &mut u.user_name)
            .with(Annotation::property_named("username"))
            .field("age", |u| &u.age, |u| &mut u.age)
            .field("scores", |u| &u.scores, |u| &mut u.scores)
            .field("permissions", |u| &u.permissions, |u| &mut u.permissions)
            .field("contact", |u| &u.contact, |u| &mut u.contact)
            .with(Annotation::embed())
            .field("contacts_by_kind", |u| &u.contacts_by_kind, |u| &mut u.contacts_by_kind)
            .with(Annotation::embed_list())
            .field("address_history", |u| &u.address_history, |u| &mut u.address_history)
            .with(Annotation::embed_list())
            .field("profile", |u| &u.profile, |u| &mut u.profile)
            .field("session_token", |u| &u.session_token, |u| &mut u.session_token)
            .with(Annotation::Ignore)
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
}

impl Mapped for Product {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |p| &p.id, |p| &mut p.id)
            .with(Annotation::Id)
            .field("name", |p| &p.name, |p| &mut p.name)
            .field("price", |p| &p.price, |p| &mut p.price)
    }
}

impl Entity for Product {
    const COLLECTION: &'static str = "products";
}

pub fn product(id: &str, name: &str, price: f64) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        price,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub user: Option<Reference<User>>,
    pub product_list: Vec<Reference<Product>>,
}

impl Mapped for Order {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |o| &o.id, |o| &mut o.id)
            .with(Annotation::Id)
            .field("user", |o| &o.user, |o| &mut o.user)
            .with(Annotation::reference())
            .field("product_list", |o| &o.product_list, |o| &mut o.product_list)
            .with(Annotation::ref_list_named("products"))
    }
}

impl Entity for Order {
    const COLLECTION: &'static str = "orders";
}

/// References in keyed maps and keyed maps of sequences.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GroupProduct {
    pub id: i64,
    pub featured: BTreeMap<String, Reference<Product>>,
    pub bundles: HashMap<String, Vec<Reference<Product>>>,
}

impl Mapped for GroupProduct {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |g| &g.id, |g| &mut g.id)
            .with(Annotation::Id)
            .field("featured", |g| &g.featured, |g| &mut g.featured)
            .with(Annotation::ref_list())
            .field("bundles", |g| &g.bundles, |g| &mut g.bundles)
            .with(Annotation::ref_list())
    }
}

impl Entity for GroupProduct {
    const COLLECTION: &'static str = "group_products";
}

/// Embedded line holding a reference of its own.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvoiceLine {
    pub quantity: u32,
    pub product: Option<Reference<Product>>,
}

impl Mapped for InvoiceLine {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("quantity", |l| &l.quantity, |l| &mut l.quantity)
            .field("product", |l| &l.product, |l| &mut l.product)
            .with(Annotation::reference())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub customer: Option<Reference<User>>,
    pub primary: InvoiceLine,
    pub lines: Vec<InvoiceLine>,
}

impl Mapped for Invoice {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |i| &i.id, |i| &mut i.id)
            .with(Annotation::Id)
            .field("customer", |i| &i.customer, |i| &mut i.customer)
            .with(Annotation::reference())
            .field("primary", |i| &i.primary, |i| &mut i.primary)
            .with(Annotation::embed())
            .field("lines", |i| &i.lines, |i| &mut i.lines)
            .with(Annotation::embed_list())
    }
}

impl Entity for Invoice {
    const COLLECTION: &'static str = "invoices";
}

// ========== Deep embedding ==========

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub contact: Contact,
}

impl Mapped for Person {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("name", |p| &p.name, |p| &mut p.name)
            .field("contact", |p| &p.contact, |p| &mut p.contact)
            .with(Annotation::embed())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Team {
    pub name: String,
    pub lead: Option<Person>,
    pub members: Vec<Person>,
    pub rotations: HashMap<String, Vec<Person>>,
}

impl Mapped for Team {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("name", |t| &t.name, |t| &mut t.name)
            .field("lead", |t| &t.lead, |t| &mut t.lead)
            .with(Annotation::embed())
            .field("members", |t| &t.members, |t| &mut t.members)
            .with(Annotation::embed_list())
            .field("rotations", |t| &t.rotations, |t| &mut t.rotations)
            .with(Annotation::embed_list())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Department {
    pub name: String,
    pub teams: BTreeMap<String, Team>,
}

impl Mapped for Department {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("name", |d| &d.name, |d| &mut d.name)
            .field("teams", |d| &d.teams, |d| &mut d.teams)
            .with(Annotation::embed_list())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub departments: Vec<Department>,
}

impl Mapped for Company {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |c| &c.id, |c| &mut c.id)
            .with(Annotation::Id)
            .field("name", |c| &c.name, |c| &mut c.name)
            .field("departments", |c| &c.departments, |c| &mut c.departments)
            .with(Annotation::embed_list())
    }
}

impl Entity for Company {
    const COLLECTION: &'static str = "companies";
}

// ========== Custom codecs ==========

/// Money in minor units; stored as a decimal number of major units.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Cents(pub i64);

pub struct CentsCodec(i64);

impl Codec for CentsCodec {
    type Output = Cents;

    fn construct(_descriptor: &FieldDescriptor, raw: &Value) -> Result<Self, CodecError> {
        raw.as_f64()
            .map(|major| CentsCodec((major * 100.0).round() as i64))
            .ok_or_else(|| CodecError::new("price must be a number"))
    }

    fn decode(self) -> Result<Cents, CodecError> {
        Ok(Cents(self.0))
    }

    fn encode(_descriptor: &FieldDescriptor, value: &Cents) -> Result<Value, CodecError> {
        Ok(Value::from(value.0 as f64 / 100.0))
    }
}

/// Comma-separated tags.
pub struct CsvCodec(String);

impl Codec for CsvCodec {
    type Output = Vec<String>;

    fn construct(_descriptor: &FieldDescriptor, raw: &Value) -> Result<Self, CodecError> {
        raw.as_str()
            .map(|s| CsvCodec(s.to_string()))
            .ok_or_else(|| CodecError::new("tags must be a string"))
    }

    fn decode(self) -> Result<Vec<String>, CodecError> {
        Ok(self
            .0
            .split(',')
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn encode(_descriptor: &FieldDescriptor, value: &Vec<String>) -> Result<Value, CodecError> {
        Ok(Value::String(value.join(",")))
    }
}

pub const CSV_CODEC: &str = "csv";

pub fn register_codecs() {
    CodecRegistry::global().register::<CsvCodec>(CSV_CODEC);
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub price: Cents,
    pub tags: Vec<String>,
}

impl Mapped for Item {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |i| &i.id, |i| &mut i.id)
            .with(Annotation::Id)
            .custom_field("price", |i| &i.price, |i| &mut i.price)
            .with(Annotation::codec::<CentsCodec>())
            .field("tags", |i| &i.tags, |i| &mut i.tags)
            .with(Annotation::codec_named(CSV_CODEC))
    }
}

// ========== Stores ==========

/// Wraps a [`MemoryStore`], recording every lookup and failing the ones
/// aimed at selected collections.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    calls: Mutex<Vec<(String, Vec<RefId>)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(collection: &str, documents: Vec<Value>) -> Self {
        let store = Self::new();
        store.insert(collection, documents);
        store
    }

    pub fn insert(&self, collection: &str, documents: Vec<Value>) {
        self.inner
            .insert_many(collection, documents.into_iter().map(doc))
            .expect("fixture documents carry ids");
    }

    pub fn fail(&self, collection: &str) {
        self.failing.lock().unwrap().insert(collection.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Vec<RefId>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, collection: &str) -> usize {
        self.calls().iter().filter(|(name, _)| name == collection).count()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn find_by_ids(&self, collection: &str, ids: &[RefId]) -> Result<HashMap<RefId, Document>, StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((collection.to_string(), ids.to_vec()));
        let failing = self.failing.lock().unwrap().contains(collection);
        if failing {
            return Err(StoreError::Unavailable(format!("{} is offline", collection)));
        }
        self.inner.find_by_ids(collection, ids).await
    }
}
