//! Deployment descriptor entity
//!
//! The already-parsed form of a deployment descriptor. Reading the
//! descriptor language happens outside this crate; the core only needs the
//! application and infrastructure selectors it declares.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{AppTuple, TupleError};

/// The application a descriptor deploys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDecl {
    pub name: String,
    /// Application type, the first component of the app tuple
    #[serde(rename = "type")]
    pub kind: String,
}

/// One infrastructure the descriptor declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureDecl {
    pub name: String,
    /// Infrastructure type, also the infrastructure registry key
    #[serde(rename = "type")]
    pub kind: String,
    pub flavor: String,
}

/// A parsed deployment descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub application: ApplicationDecl,
    #[serde(default)]
    pub infrastructure: Vec<InfrastructureDecl>,
    /// Name of the declared infrastructure the application targets
    pub project_infrastructure: String,
}

impl Descriptor {
    /// Descriptor with a single infrastructure that the application targets
    pub fn single(
        app_name: impl Into<String>,
        app_kind: impl Into<String>,
        infra: InfrastructureDecl,
    ) -> Self {
        Self {
            application: ApplicationDecl {
                name: app_name.into(),
                kind: app_kind.into(),
            },
            project_infrastructure: infra.name.clone(),
            infrastructure: vec![infra],
        }
    }

    /// Add another declared infrastructure
    pub fn with_infrastructure(mut self, infra: InfrastructureDecl) -> Self {
        self.infrastructure.push(infra);
        self
    }

    /// The infrastructure the application is deployed onto
    pub fn target(&self) -> Option<&InfrastructureDecl> {
        self.infrastructure
            .iter()
            .find(|i| i.name == self.project_infrastructure)
    }

    /// Plugin key for the declared application on its target infrastructure
    pub fn app_tuple(&self) -> Result<AppTuple, TupleError> {
        let target = self.target().ok_or(TupleError::EmptyComponent {
            field: "infrastructure type",
        })?;
        AppTuple::new(&self.application.kind, &target.kind, &target.flavor)
    }

    /// Emptiness problems; an empty list means the descriptor is usable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.application.name.trim().is_empty() {
            problems.push("application name is empty".to_string());
        }
        if self.application.kind.trim().is_empty() {
            problems.push("application type is empty".to_string());
        }
        if self.infrastructure.is_empty() {
            problems.push("no infrastructure is declared".to_string());
        }

        for (idx, infra) in self.infrastructure.iter().enumerate() {
            if infra.name.trim().is_empty() {
                problems.push(format!("infrastructure #{} has an empty name", idx + 1));
            }
            if infra.kind.trim().is_empty() {
                problems.push(format!("infrastructure '{}' has an empty type", infra.name));
            }
            if infra.flavor.trim().is_empty() {
                problems.push(format!("infrastructure '{}' has an empty flavor", infra.name));
            }
        }

        if !self.infrastructure.is_empty() && self.target().is_none() {
            problems.push(format!(
                "project infrastructure '{}' is not declared",
                self.project_infrastructure
            ));
        }

        problems
    }
}

impl InfrastructureDecl {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        flavor: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            flavor: flavor.into(),
        }
    }
}
