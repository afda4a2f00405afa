//! CRUD stored procedure generation.
//!
//! Text is generated, never executed here. Parameters use the dialect's
//! prefix (`@_Name`, `_Name`) so they never collide with column names.

use serde::{Deserialize, Serialize};

use crate::catalog::{KeyGeneration, ModelComposition, PropertyDescriptor};
use crate::config::NamingConvention;
use crate::dialect::{ProcedureParameter, SqlDialect};

use super::table::TableTarget;

/// Name of the WHERE fragment parameter of the select procedure.
pub const EXPRESSION_PARAMETER: &str = "expression";
/// Name of the row limit parameter of the select procedures.
pub const MAX_RESULTS_PARAMETER: &str = "maximumResults";
/// Name of the row offset parameter of the select procedures.
pub const OFFSET_PARAMETER: &str = "offset";

const PAGING_TYPE: &str = "int";
const INDENT: &str = "    ";

/// The five generated procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcedureKind {
    Insert,
    Update,
    Delete,
    Select,
    SelectAll,
}

impl ProcedureKind {
    pub const ALL: [ProcedureKind; 5] = [
        ProcedureKind::Insert,
        ProcedureKind::Update,
        ProcedureKind::Delete,
        ProcedureKind::Select,
        ProcedureKind::SelectAll,
    ];

    pub fn suffix(self, naming: &NamingConvention) -> &str {
        match self {
            ProcedureKind::Insert => &naming.insert_suffix,
            ProcedureKind::Update => &naming.update_suffix,
            ProcedureKind::Delete => &naming.delete_suffix,
            ProcedureKind::Select => &naming.select_suffix,
            ProcedureKind::SelectAll => &naming.select_all_suffix,
        }
    }

    /// Unqualified procedure name for a model.
    pub fn name(self, naming: &NamingConvention, composition: &ModelComposition) -> String {
        naming.procedure_name(composition.table(), self.suffix(naming))
    }
}

/// Generated procedure text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureDefinition {
    /// Unqualified name.
    pub name: String,
    pub kind: ProcedureKind,
    /// Statements to execute, in order.
    pub statements: Vec<String>,
}

/// Generates procedure text for one model.
pub struct ProcedureBuilder<'a> {
    dialect: &'a dyn SqlDialect,
    naming: &'a NamingConvention,
    composition: &'a ModelComposition,
    target: TableTarget,
}

impl<'a> ProcedureBuilder<'a> {
    pub fn new(
        dialect: &'a dyn SqlDialect,
        naming: &'a NamingConvention,
        composition: &'a ModelComposition,
    ) -> Self {
        Self {
            dialect,
            naming,
            composition,
            target: TableTarget::new(dialect, naming, composition),
        }
    }

    /// CREATE (or ALTER when `alter`) text of one procedure.
    pub fn build(&self, kind: ProcedureKind, alter: bool) -> ProcedureDefinition {
        let name = kind.name(self.naming, self.composition);
        let (parameters, body) = match kind {
            ProcedureKind::Insert => self.insert(),
            ProcedureKind::Update => self.update(),
            ProcedureKind::Delete => self.delete(),
            ProcedureKind::Select => self.select(),
            ProcedureKind::SelectAll => self.select_all(),
        };
        let body: Vec<String> = body.into_iter().map(|line| format!("{INDENT}{line}")).collect();
        let qualified = self.dialect.qualify(&self.target.schema, &name);
        ProcedureDefinition {
            statements: self.dialect.procedure(&qualified, &parameters, &body, alter),
            name,
            kind,
        }
    }

    /// All five procedures.
    pub fn build_all(&self, alter: bool) -> Vec<ProcedureDefinition> {
        ProcedureKind::ALL
            .iter()
            .map(|kind| self.build(*kind, alter))
            .collect()
    }

    fn parameter_type(&self, property: &PropertyDescriptor) -> String {
        self.dialect.sql_type(property, property.is_unique())
    }

    fn key_filter(&self) -> String {
        let key = &self.composition.primary_key().name;
        format!("{} = {}", self.dialect.identifier(key), self.dialect.parameter(key))
    }

    fn read_back(&self, filter: &str) -> String {
        format!("SELECT * FROM {} WHERE {filter};", self.target.qualified)
    }

    fn order_by(&self) -> String {
        match self.composition.date_created() {
            Some(created) => format!("{} DESC", self.dialect.identifier(&created.name)),
            None => self.dialect.identifier(&self.composition.primary_key().name).into_owned(),
        }
    }

    fn insert(&self) -> (Vec<ProcedureParameter>, Vec<String>) {
        let key = self.composition.primary_key();
        let generation = self.composition.key_generation();

        let mut parameters = Vec::new();
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut body = Vec::new();

        if generation == KeyGeneration::Generated {
            body.push(self.dialect.declare(&key.name, &self.parameter_type(key), self.dialect.new_guid()));
        }

        for property in self.composition.persisted() {
            let is_key = self.composition.is_primary_key(&property.name);
            if is_key && generation == KeyGeneration::AutoIncrement {
                continue;
            }
            columns.push(self.dialect.identifier(&property.name).into_owned());
            match property.auto_kind() {
                Some(kind) => values.push(self.dialect.auto_value(kind).to_string()),
                None => {
                    values.push(self.dialect.parameter(&property.name));
                    if !(is_key && generation == KeyGeneration::Generated) {
                        parameters.push(if property.nullable {
                            ProcedureParameter::optional(&property.name, self.parameter_type(property))
                        } else {
                            ProcedureParameter::required(&property.name, self.parameter_type(property))
                        });
                    }
                }
            }
        }

        body.push(format!(
            "INSERT INTO {} ({})",
            self.target.qualified,
            columns.join(", ")
        ));
        body.push(format!("VALUES ({});", values.join(", ")));
        let read_back = match generation {
            KeyGeneration::AutoIncrement => {
                format!("{} = {}", self.dialect.identifier(&key.name), self.dialect.last_identity())
            }
            KeyGeneration::Supplied | KeyGeneration::Generated => self.key_filter(),
        };
        body.push(self.read_back(&read_back));
        (parameters, body)
    }

    fn update(&self) -> (Vec<ProcedureParameter>, Vec<String>) {
        let key = self.composition.primary_key();
        let mut parameters = vec![ProcedureParameter::required(&key.name, self.parameter_type(key))];
        let mut assignments = Vec::new();

        for property in self.composition.persisted() {
            if self.composition.is_primary_key(&property.name) {
                continue;
            }
            if self.composition.is_auto(&property.name) {
                let is_created = self
                    .composition
                    .date_created()
                    .is_some_and(|created| created.name == property.name);
                if let (false, Some(kind)) = (is_created, property.auto_kind()) {
                    assignments.push(format!(
                        "{} = {}",
                        self.dialect.identifier(&property.name),
                        self.dialect.auto_value(kind)
                    ));
                }
                continue;
            }
            parameters.push(ProcedureParameter::optional(&property.name, self.parameter_type(property)));
            assignments.push(format!(
                "{name} = {coalesce}({parameter}, {name})",
                name = self.dialect.identifier(&property.name),
                coalesce = self.dialect.null_coalesce(),
                parameter = self.dialect.parameter(&property.name),
            ));
        }

        let mut body = Vec::new();
        if !assignments.is_empty() {
            body.push(format!("UPDATE {} SET", self.target.qualified));
            let last = assignments.len() - 1;
            for (i, assignment) in assignments.iter().enumerate() {
                let separator = if i == last { "" } else { "," };
                body.push(format!("{INDENT}{assignment}{separator}"));
            }
            body.push(format!("WHERE {};", self.key_filter()));
        }
        body.push(self.read_back(&self.key_filter()));
        (parameters, body)
    }

    fn delete(&self) -> (Vec<ProcedureParameter>, Vec<String>) {
        let key = self.composition.primary_key();
        let parameters = vec![ProcedureParameter::required(&key.name, self.parameter_type(key))];
        let body = vec![format!("DELETE FROM {} WHERE {};", self.target.qualified, self.key_filter())];
        (parameters, body)
    }

    fn paging_parameters(&self) -> Vec<ProcedureParameter> {
        vec![
            ProcedureParameter::optional(MAX_RESULTS_PARAMETER, PAGING_TYPE),
            ProcedureParameter::optional(OFFSET_PARAMETER, PAGING_TYPE),
        ]
    }

    fn select(&self) -> (Vec<ProcedureParameter>, Vec<String>) {
        let mut parameters = vec![ProcedureParameter::required(
            EXPRESSION_PARAMETER,
            self.dialect.expression_type(),
        )];
        parameters.extend(self.paging_parameters());
        let body = self.dialect.dynamic_select(&self.target.qualified, &self.order_by());
        (parameters, body)
    }

    fn select_all(&self) -> (Vec<ProcedureParameter>, Vec<String>) {
        let body = self.dialect.paged_select_all(&self.target.qualified, &self.order_by());
        (self.paging_parameters(), body)
    }
}
