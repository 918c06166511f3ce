mod common;

use common::*;
use datafold_mapper::{decode, encode, Annotation, Document, Mapped, MappingBuilder, RefKey, Reference};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

fn person(name: &str, city: &str) -> Person {
    Person {
        name: name.to_string(),
        contact: Contact {
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            address: Some(Address {
                street: "1 Main St".to_string(),
                city: city.to_string(),
                zip: Some("12345".to_string()),
            }),
            previous_addresses: vec![Address {
                city: "Old Town".to_string(),
                ..Default::default()
            }],
        },
    }
}

fn company() -> Company {
    let mut rotations = HashMap::new();
    rotations.insert("night".to_string(), vec![person("Grace", "Arlington"), person("Alan", "Wilmslow")]);
    rotations.insert("weekend".to_string(), Vec::new());

    let mut teams = BTreeMap::new();
    teams.insert(
        "compilers".to_string(),
        Team {
            name: "Compilers".to_string(),
            lead: Some(person("Ada", "London")),
            members: vec![person("Grace", "Arlington"), person("Edsger", "Nuenen")],
            rotations,
        },
    );
    teams.insert("empty".to_string(), Team::default());

    Company {
        id: "c1".to_string(),
        name: "Analytical Engines".to_string(),
        departments: vec![
            Department {
                name: "Research".to_string(),
                teams,
            },
            Department::default(),
        ],
    }
}

#[test]
fn test_deep_object_graph_round_trips() {
    init_logging();
    let original = company();
    let document = encode(&original).unwrap();
    let decoded: Company = decode(&document).unwrap();
    assert_eq!(decoded, original);

    let again = encode(&decoded).unwrap();
    assert_eq!(again, document);
}

#[test]
fn test_stored_document_round_trips() {
    let stored = json!({
        "_id": "c2",
        "name": "Difference Engines",
        "departments": [{
            "name": "Ops",
            "teams": {
                "infra": {
                    "name": "Infra",
                    "members": [{
                        "name": "Linus",
                        "contact": {
                            "email": "linus@example.com",
                            "address": {"street": "2 Side St", "city": "Helsinki"},
                            "previous_addresses": []
                        }
                    }],
                    "rotations": {"day": [{"name": "Ken", "contact": {"email": "ken@example.com"}}]}
                }
            }
        }]
    });

    let company: Company = decode(&doc(stored)).unwrap();
    let member = &company.departments[0].teams["infra"].members[0];
    assert_eq!(member.contact.address.as_ref().map(|a| a.city.as_str()), Some("Helsinki"));

    let reencoded: Company = decode(&encode(&company).unwrap()).unwrap();
    assert_eq!(reencoded, company);
}

#[test]
fn test_user_with_every_shape_round_trips() {
    let mut permissions = HashMap::new();
    permissions.insert("read".to_string(), vec![1, 2, 3]);
    permissions.insert("write".to_string(), Vec::new());

    let mut contacts_by_kind = BTreeMap::new();
    contacts_by_kind.insert("home".to_string(), person("Ada", "London").contact);

    let mut address_history = HashMap::new();
    address_history.insert(
        "2020".to_string(),
        vec![Address {
            city: "Paris".to_string(),
            ..Default::default()
        }],
    );

    let user = User {
        id: "u1".to_string(),
        user_name: "ada".to_string(),
        age: 36,
        scores: vec![1.5, 2.0],
        permissions,
        contact: person("Ada", "London").contact,
        contacts_by_kind,
        address_history,
        profile: json!({"theme": "dark"}),
        session_token: "secret".to_string(),
    };

    let document = encode(&user).unwrap();
    assert_eq!(document.get("username"), Some(&json!("ada")));
    assert!(!document.contains_key("session_token"));

    let decoded: User = decode(&document).unwrap();
    assert_eq!(
        decoded,
        User {
            session_token: String::new(),
            ..user
        }
    );
}

#[test]
fn test_references_encode_as_ids() {
    let order = Order {
        id: "o1".to_string(),
        user: Some(Reference::Missing(RefKey::new("users", "u1"))),
        product_list: vec![
            Reference::resolved(RefKey::new("products", "p1"), product("p1", "Widget", 2.5)),
            Reference::unresolved("products", "p2"),
        ],
    };
    let document = encode(&order).unwrap();
    assert_eq!(
        Value::Object(document.clone()),
        json!({"_id": "o1", "user": "u1", "products": ["p1", "p2"]})
    );

    let decoded: Order = decode(&document).unwrap();
    assert_eq!(decoded.user, Some(Reference::unresolved("users", "u1")));
    assert_eq!(decoded.product_list[0], Reference::unresolved("products", "p1"));
}

#[test]
fn test_foreign_collections_survive_round_trip() {
    let stored = doc(json!({
        "_id": "o1",
        "user": {"$ref": "archived_users", "$id": "u9"},
        "products": ["p1", {"$ref": "legacy_products", "$id": 7}]
    }));
    let order: Order = decode(&stored).unwrap();
    assert_eq!(order.user.as_ref().map(Reference::collection), Some("archived_users"));

    let document = encode(&order).unwrap();
    assert_eq!(Value::Object(document.clone()), Value::Object(stored));

    let again: Order = decode(&document).unwrap();
    assert_eq!(again, order);
    assert_eq!(again.product_list[1].key(), &RefKey::new("legacy_products", 7i64));
}

#[derive(Debug, Default, PartialEq)]
struct Counter {
    id: String,
    hits: u64,
    slots: Vec<usize>,
}

impl Mapped for Counter {
    fn mapping(builder: MappingBuilder<Self>) -> MappingBuilder<Self> {
        builder
            .field("id", |c| &c.id, |c| &mut c.id)
            .with(Annotation::Id)
            .field("hits", |c| &c.hits, |c| &mut c.hits)
            .field("slots", |c| &c.slots, |c| &mut c.slots)
    }
}

#[test]
fn test_large_unsigned_values_are_stored_exactly() {
    let counter = Counter {
        id: "c1".to_string(),
        hits: u64::MAX,
        slots: vec![0, usize::MAX],
    };
    let document = encode(&counter).unwrap();
    assert_eq!(
        Value::Object(document.clone()),
        json!({"_id": "c1", "hits": u64::MAX, "slots": [0, usize::MAX]})
    );
    assert_eq!(document["hits"].as_u64(), Some(u64::MAX));
    assert_eq!(decode::<Counter>(&document).unwrap(), counter);
}

#[test]
fn test_codec_fields_round_trip() {
    register_codecs();
    let item = Item {
        id: 7,
        price: Cents(1999),
        tags: vec!["new".to_string(), "sale".to_string()],
    };
    let document: Document = encode(&item).unwrap();
    assert_eq!(
        Value::Object(document.clone()),
        json!({"_id": 7, "price": 19.99, "tags": "new,sale"})
    );
    assert_eq!(decode::<Item>(&document).unwrap(), item);
}
