use super::field_type::{ElementKind, SlotInfo, TypeRef};
use crate::codec::{CodecRef, CodecVTable};
use crate::document::ID_KEY;
use crate::error::{MapperError, MapperResult};

/// How a field is stored and therefore which decoder handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Id,
    Property,
    Embed,
    EmbedCollection,
    Ref,
    RefCollection,
    CustomCodec,
    Ignored,
}

impl Classification {
    /// Rank in the fixed precedence order; lower wins.
    ///
    /// Id > Embed > EmbedCollection > Ref > RefCollection > Ignored >
    /// CustomCodec > Property.
    pub fn precedence(self) -> u8 {
        match self {
            Classification::Id => 0,
            Classification::Embed => 1,
            Classification::EmbedCollection => 2,
            Classification::Ref => 3,
            Classification::RefCollection => 4,
            Classification::Ignored => 5,
            Classification::CustomCodec => 6,
            Classification::Property => 7,
        }
    }

    pub fn is_reference(self) -> bool {
        matches!(self, Classification::Ref | Classification::RefCollection)
    }

    pub fn is_embedded(self) -> bool {
        matches!(self, Classification::Embed | Classification::EmbedCollection)
    }
}

/// Container shape of a field's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    Scalar,
    Sequence,
    KeyedMap,
    KeyedMapOfSequence,
}

/// Field metadata as declared on a mapping. A field may carry several; the
/// precedence order picks one.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Id,
    Property { key: Option<String> },
    Embed { key: Option<String> },
    EmbedList { key: Option<String> },
    Ref { key: Option<String>, collection: Option<String> },
    RefList { key: Option<String>, collection: Option<String> },
    Ignore,
    CustomCodec(CodecRef),
}

impl Annotation {
    pub fn property() -> Self {
        Annotation::Property { key: None }
    }

    /// A property stored under a different key.
    pub fn property_named(key: impl Into<String>) -> Self {
        Annotation::Property { key: Some(key.into()) }
    }

    pub fn embed() -> Self {
        Annotation::Embed { key: None }
    }

    pub fn embed_named(key: impl Into<String>) -> Self {
        Annotation::Embed { key: Some(key.into()) }
    }

    pub fn embed_list() -> Self {
        Annotation::EmbedList { key: None }
    }

    pub fn embed_list_named(key: impl Into<String>) -> Self {
        Annotation::EmbedList { key: Some(key.into()) }
    }

    /// A reference into the target entity's own collection.
    pub fn reference() -> Self {
        Annotation::Ref { key: None, collection: None }
    }

    /// A reference into an explicitly named collection.
    pub fn reference_to(collection: impl Into<String>) -> Self {
        Annotation::Ref {
            key: None,
            collection: Some(collection.into()),
        }
    }

    pub fn reference_named(key: impl Into<String>) -> Self {
        Annotation::Ref {
            key: Some(key.into()),
            collection: None,
        }
    }

    pub fn ref_list() -> Self {
        Annotation::RefList { key: None, collection: None }
    }

    pub fn ref_list_to(collection: impl Into<String>) -> Self {
        Annotation::RefList {
            key: None,
            collection: Some(collection.into()),
        }
    }

    pub fn ref_list_named(key: impl Into<String>) -> Self {
        Annotation::RefList {
            key: Some(key.into()),
            collection: None,
        }
    }

    pub fn codec<C: crate::codec::Codec>() -> Self {
        Annotation::CustomCodec(CodecRef::of::<C>())
    }

    pub fn codec_named(name: impl Into<String>) -> Self {
        Annotation::CustomCodec(CodecRef::named(name))
    }

    pub fn classification(&self) -> Classification {
        match self {
            Annotation::Id => Classification::Id,
            Annotation::Property { .. } => Classification::Property,
            Annotation::Embed { .. } => Classification::Embed,
            Annotation::EmbedList { .. } => Classification::EmbedCollection,
            Annotation::Ref { .. } => Classification::Ref,
            Annotation::RefList { .. } => Classification::RefCollection,
            Annotation::Ignore => Classification::Ignored,
            Annotation::CustomCodec(_) => Classification::CustomCodec,
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            Annotation::Property { key }
            | Annotation::Embed { key }
            | Annotation::EmbedList { key }
            | Annotation::Ref { key, .. }
            | Annotation::RefList { key, .. } => key.as_deref(),
            Annotation::Id | Annotation::Ignore | Annotation::CustomCodec(_) => None,
        }
    }

    fn collection(&self) -> Option<&str> {
        match self {
            Annotation::Ref { collection, .. } | Annotation::RefList { collection, .. } => {
                collection.as_deref()
            }
            _ => None,
        }
    }
}

/// Picks the winning annotation by precedence. `None` means no annotation,
/// which classifies as a plain property.
pub fn winning_annotation(annotations: &[Annotation]) -> Option<&Annotation> {
    annotations
        .iter()
        .min_by_key(|annotation| annotation.classification().precedence())
}

/// Static metadata about one field of a mapped type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name on the Rust type
    pub name: &'static str,
    /// Key in the stored document
    pub key: String,
    pub classification: Classification,
    pub shape: ContainerShape,
    /// Rust type name of the field
    pub value_type: &'static str,
    /// Embedded type, for Embed and EmbedCollection
    pub nested_type: Option<TypeRef>,
    /// Collection referenced, for Ref and RefCollection
    pub target_collection: Option<String>,
    /// Resolved codec, for CustomCodec
    pub codec: Option<CodecVTable>,
    /// Property values are taken verbatim (`serde_json::Value` fields)
    pub passthrough: bool,
}

impl FieldDescriptor {
    /// A descriptor with no classification-specific parameters, stored under
    /// its own name.
    pub fn new(name: &'static str, classification: Classification, shape: ContainerShape) -> Self {
        Self {
            name,
            key: name.to_string(),
            classification,
            shape,
            value_type: "",
            nested_type: None,
            target_collection: None,
            codec: None,
            passthrough: false,
        }
    }

    /// Derives the descriptor for one field from its annotations and the
    /// static facts about its Rust type.
    pub fn derive(
        type_name: &'static str,
        name: &'static str,
        annotations: &[Annotation],
        slot: &SlotInfo,
    ) -> MapperResult<Self> {
        let fail = |reason: String| MapperError::Descriptor {
            type_name: type_name.to_string(),
            field: name.to_string(),
            reason,
        };

        let winner = winning_annotation(annotations);
        let classification = winner
            .map(Annotation::classification)
            .unwrap_or(Classification::Property);

        let key = match classification {
            Classification::Id => ID_KEY.to_string(),
            _ => winner
                .and_then(Annotation::key)
                .unwrap_or(name)
                .to_string(),
        };

        let mut descriptor = Self {
            name,
            key,
            classification,
            shape: slot.shape,
            value_type: slot.value_type_name,
            nested_type: None,
            target_collection: None,
            codec: None,
            passthrough: false,
        };

        match (classification, &slot.element) {
            (Classification::Ignored, _) => {}

            (Classification::CustomCodec, _) => {
                let codec_ref = match winner {
                    Some(Annotation::CustomCodec(codec_ref)) => codec_ref,
                    _ => return Err(fail("codec annotation missing".to_string())),
                };
                let vtable = codec_ref.resolve().ok_or_else(|| {
                    fail(format!("no codec registered for {:?}", codec_ref))
                })?;
                if vtable.output_type != slot.value_type {
                    return Err(fail(format!(
                        "codec {} produces {}, field is {}",
                        vtable.name, vtable.output_type_name, slot.value_type_name
                    )));
                }
                descriptor.codec = Some(vtable);
            }

            (_, None) => {
                return Err(fail(format!(
                    "{} can only be mapped through a custom codec",
                    slot.value_type_name
                )))
            }

            (Classification::Id, Some(ElementKind::Primitive)) if slot.shape == ContainerShape::Scalar => {}

            (Classification::Property, Some(ElementKind::Primitive)) => {}

            (Classification::Property, Some(ElementKind::Json)) => descriptor.passthrough = true,

            (Classification::Embed, Some(ElementKind::Embedded(nested)))
                if slot.shape == ContainerShape::Scalar =>
            {
                descriptor.nested_type = Some(*nested);
            }

            (Classification::EmbedCollection, Some(ElementKind::Embedded(nested)))
                if slot.shape != ContainerShape::Scalar =>
            {
                descriptor.nested_type = Some(*nested);
            }

            (Classification::Ref, Some(ElementKind::Reference(target)))
                if slot.shape == ContainerShape::Scalar =>
            {
                descriptor.target_collection = Some(
                    winner
                        .and_then(Annotation::collection)
                        .unwrap_or(target.collection)
                        .to_string(),
                );
            }

            (Classification::RefCollection, Some(ElementKind::Reference(target)))
                if slot.shape != ContainerShape::Scalar =>
            {
                descriptor.target_collection = Some(
                    winner
                        .and_then(Annotation::collection)
                        .unwrap_or(target.collection)
                        .to_string(),
                );
            }

            (classification, Some(element)) => {
                return Err(fail(format!(
                    "{:?} cannot be applied to {} ({} {:?})",
                    classification,
                    slot.value_type_name,
                    element.describe(),
                    slot.shape
                )))
            }
        }

        Ok(descriptor)
    }

    pub fn is_ignored(&self) -> bool {
        self.classification == Classification::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, CodecError};
    use serde_json::Value;

    struct CentsCodec(i64);

    impl Codec for CentsCodec {
        type Output = i64;

        fn construct(_d: &FieldDescriptor, raw: &Value) -> Result<Self, CodecError> {
            raw.as_f64()
                .map(|v| CentsCodec((v * 100.0).round() as i64))
                .ok_or_else(|| CodecError::new("not a number"))
        }

        fn decode(self) -> Result<i64, CodecError> {
            Ok(self.0)
        }

        fn encode(_d: &FieldDescriptor, value: &i64) -> Result<Value, CodecError> {
            Ok(Value::from(*value as f64 / 100.0))
        }
    }

    fn classify(annotations: &[Annotation]) -> Classification {
        winning_annotation(annotations)
            .map(Annotation::classification)
            .unwrap_or(Classification::Property)
    }

    #[test]
    fn test_precedence_is_independent_of_declaration_order() {
        let all = vec![
            Annotation::Id,
            Annotation::embed(),
            Annotation::embed_list(),
            Annotation::reference(),
            Annotation::ref_list(),
            Annotation::Ignore,
            Annotation::codec::<CentsCodec>(),
            Annotation::property(),
        ];

        // Every pair, both orders: the earlier entry in the precedence list wins.
        for (i, first) in all.iter().enumerate() {
            for second in all.iter().skip(i + 1) {
                let forward = classify(&[first.clone(), second.clone()]);
                let backward = classify(&[second.clone(), first.clone()]);
                assert_eq!(forward, first.classification());
                assert_eq!(backward, first.classification());
            }
        }

        let mut reversed = all.clone();
        reversed.reverse();
        assert_eq!(classify(&reversed), Classification::Id);
    }

    #[test]
    fn test_no_annotation_is_property() {
        assert_eq!(classify(&[]), Classification::Property);
    }

    #[test]
    fn test_id_and_property_classifies_as_id() {
        let slot = SlotInfo::of::<String>();
        let descriptor =
            FieldDescriptor::derive("User", "id", &[Annotation::property(), Annotation::Id], &slot).unwrap();
        assert_eq!(descriptor.classification, Classification::Id);
        assert_eq!(descriptor.key, ID_KEY);
    }

    #[test]
    fn test_id_and_codec_classifies_as_id() {
        let slot = SlotInfo::of::<i64>();
        let descriptor = FieldDescriptor::derive(
            "User",
            "id",
            &[Annotation::codec::<CentsCodec>(), Annotation::Id],
            &slot,
        )
        .unwrap();
        assert_eq!(descriptor.classification, Classification::Id);
        assert!(descriptor.codec.is_none());
    }

    #[test]
    fn test_storage_key_alias() {
        let slot = SlotInfo::of::<String>();
        let descriptor =
            FieldDescriptor::derive("User", "user_name", &[Annotation::property_named("username")], &slot)
                .unwrap();
        assert_eq!(descriptor.key, "username");
        assert_eq!(descriptor.name, "user_name");
    }

    #[test]
    fn test_unknown_named_codec_is_descriptor_error() {
        let slot = SlotInfo::of::<i64>();
        let err = FieldDescriptor::derive(
            "Item",
            "price",
            &[Annotation::codec_named("field-tests-not-registered")],
            &slot,
        )
        .unwrap_err();
        assert!(matches!(err, MapperError::Descriptor { .. }));
    }

    #[test]
    fn test_codec_output_must_match_field_type() {
        let slot = SlotInfo::of::<String>();
        let err = FieldDescriptor::derive("Item", "price", &[Annotation::codec::<CentsCodec>()], &slot)
            .unwrap_err();
        match err {
            MapperError::Descriptor { field, reason, .. } => {
                assert_eq!(field, "price");
                assert!(reason.contains("produces"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_shape_comes_from_the_type() {
        let descriptor =
            FieldDescriptor::derive("User", "scores", &[], &SlotInfo::of::<Vec<f32>>()).unwrap();
        assert_eq!(descriptor.shape, ContainerShape::Sequence);

        let descriptor = FieldDescriptor::derive(
            "User",
            "permissions",
            &[],
            &SlotInfo::of::<std::collections::HashMap<String, Vec<i32>>>(),
        )
        .unwrap();
        assert_eq!(descriptor.shape, ContainerShape::KeyedMapOfSequence);
    }

    #[test]
    fn test_embed_on_primitive_is_rejected() {
        let err = FieldDescriptor::derive("User", "age", &[Annotation::embed()], &SlotInfo::of::<i32>())
            .unwrap_err();
        assert!(matches!(err, MapperError::Descriptor { .. }));
    }

    #[test]
    fn test_ignored_accepts_anything() {
        let descriptor =
            FieldDescriptor::derive("User", "cache", &[Annotation::Ignore], &SlotInfo::of::<Vec<f32>>()).unwrap();
        assert!(descriptor.is_ignored());
    }
}
