//! Shared models and setup for the integration tests

#![allow(dead_code)]

use tablemap::{
    Database, DatabaseBuilder, FieldType, MapperConfig, Model, ModelDefinition, ModelResult,
    Record, Related,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Flavor {
    pub id: Uuid,
    pub name: String,
}

impl Model for Flavor {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("flavor")
            .field("id", FieldType::Uuid)
            .text("name", 64)
            .primary_key("id")
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            id: record.take("id")?,
            name: record.take("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coffee {
    pub id: Uuid,
    pub sweetener: Option<String>,
    pub flavor: Related<Flavor>,
}

impl Model for Coffee {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("coffee")
            .field("id", FieldType::Uuid)
            .optional("sweetener", FieldType::Text)
            .reference::<Flavor>("flavor")
            .primary_key("id")
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("id", self.id)
            .with("sweetener", self.sweetener.clone());
        record.set("flavor", (&self.flavor).into());
        record
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            id: record.take("id")?,
            sweetener: record.take("sweetener")?,
            flavor: record.take_related("flavor")?,
        })
    }
}

/// Self-referencing tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub name: String,
    pub parent: Option<Related<Node>>,
}

impl Model for Node {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("node")
            .field("id", FieldType::Integer)
            .field("name", FieldType::Text)
            .optional_reference::<Node>("parent")
            .back_reference("parent", "children")
            .primary_key("id")
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str());
        record.set("parent", (&self.parent).into());
        record
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            id: record.take("id")?,
            name: record.take("name")?,
            parent: record.take_optional_related("parent")?,
        })
    }
}

/// Table with nothing but a primary key
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
}

impl Model for Tag {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("tag").text("name", 32).primary_key("name")
    }

    fn to_record(&self) -> Record {
        Record::new().with("name", self.name.as_str())
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            name: record.take("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

impl Model for Team {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("team")
            .field("id", FieldType::Integer)
            .field("name", FieldType::Text)
            .primary_key("id")
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            id: record.take("id")?,
            name: record.take("name")?,
        })
    }
}

/// Two relationships to the same table
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub id: i64,
    pub home: Related<Team>,
    pub away: Related<Team>,
}

impl Model for Fixture {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("fixture")
            .field("id", FieldType::Integer)
            .reference::<Team>("home")
            .reference::<Team>("away")
            .primary_key("id")
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new().with("id", self.id);
        record.set("home", (&self.home).into());
        record.set("away", (&self.away).into());
        record
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            id: record.take("id")?,
            home: record.take_related("home")?,
            away: record.take_related("away")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Roaster {
    pub id: i64,
    pub name: String,
    /// Filled only when loaded deep enough
    pub bags: Vec<Bag>,
}

impl Model for Roaster {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("roaster")
            .field("id", FieldType::Integer)
            .field("name", FieldType::Text)
            .primary_key("id")
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            id: record.take("id")?,
            name: record.take("name")?,
            bags: record.take_many("bags")?,
        })
    }
}

/// Owner side of a named one-to-many relationship
#[derive(Debug, Clone, PartialEq)]
pub struct Bag {
    pub id: i64,
    pub label: String,
    pub roaster: Related<Roaster>,
}

impl Model for Bag {
    fn definition() -> ModelDefinition {
        ModelDefinition::new("bag")
            .field("id", FieldType::Integer)
            .field("label", FieldType::Text)
            .reference::<Roaster>("roaster")
            .back_reference("roaster", "bags")
            .primary_key("id")
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("id", self.id)
            .with("label", self.label.as_str());
        record.set("roaster", (&self.roaster).into());
        record
    }

    fn from_record(mut record: Record) -> ModelResult<Self> {
        Ok(Self {
            id: record.take("id")?,
            label: record.take("label")?,
            roaster: record.take_related("roaster")?,
        })
    }
}

/// Untyped table with a unique column besides the key
pub fn bean_definition() -> ModelDefinition {
    ModelDefinition::new("bean")
        .field("id", FieldType::Integer)
        .text("name", 32)
        .unique("name")
        .primary_key("id")
}

/// Untyped table with two self-references
pub fn person_definition() -> ModelDefinition {
    ModelDefinition::new("person")
        .field("id", FieldType::Integer)
        .field("name", FieldType::Text)
        .reference_table("mother", "person", true)
        .reference_table("father", "person", true)
        .primary_key("id")
}

/// Untyped pair referencing each other
pub fn resident_definition() -> ModelDefinition {
    ModelDefinition::new("resident")
        .field("id", FieldType::Integer)
        .reference_table("home", "house", true)
        .primary_key("id")
}

pub fn house_definition() -> ModelDefinition {
    ModelDefinition::new("house")
        .field("id", FieldType::Integer)
        .reference_table("owner", "resident", true)
        .primary_key("id")
}

/// Untyped table covering the remaining scalar types
pub fn event_definition() -> ModelDefinition {
    ModelDefinition::new("event")
        .field("id", FieldType::Integer)
        .field("active", FieldType::Boolean)
        .field("at", FieldType::DateTime)
        .optional("payload", FieldType::Json)
        .optional("score", FieldType::Float)
        .primary_key("id")
}

pub async fn builder(config: MapperConfig) -> DatabaseBuilder {
    init_tracing();
    DatabaseBuilder::connect(config)
        .await
        .unwrap()
        .register::<Flavor>()
        .unwrap()
        .register::<Coffee>()
        .unwrap()
        .register::<Node>()
        .unwrap()
        .register::<Tag>()
        .unwrap()
        .register::<Team>()
        .unwrap()
        .register::<Fixture>()
        .unwrap()
        .register::<Roaster>()
        .unwrap()
        .register::<Bag>()
        .unwrap()
        .register_definition(&event_definition())
        .unwrap()
        .register_definition(&bean_definition())
        .unwrap()
        .register_definition(&person_definition())
        .unwrap()
        .register_definition(&resident_definition())
        .unwrap()
        .register_definition(&house_definition())
        .unwrap()
}

/// Route library logs to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh in-memory database with every test table
pub async fn database() -> Database {
    init_tracing();
    builder(MapperConfig::with_url("sqlite::memory:"))
        .await
        .initialize()
        .await
        .unwrap()
}

pub fn flavor(name: &str) -> Flavor {
    Flavor {
        id: Uuid::new_v4(),
        name: name.to_string(),
    }
}
