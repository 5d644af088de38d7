//! Pipeline driver
//!
//! Runs one phase at a time over the plugins the descriptor selects. Each
//! plugin is a branch: a branch that fails is reported and recorded, but
//! never stops its siblings. Infrastructure provisioning runs its branches
//! on scoped threads.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::thread;

use thiserror::Error;
use tracing::{error, info, warn};

use super::Core;
use crate::domain::entities::InfrastructureDecl;
use crate::domain::ports::{PhaseContext, ScopedStore, SinkResult};
use crate::domain::value_objects::Phase;
use crate::error::DeckhandResult;

/// What a `PhaseError` was raised by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Phase(Phase),
    /// Infrastructure teardown
    Destroy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Phase(phase) => f.write_str(phase.as_str()),
            Stage::Destroy => f.write_str("destroy"),
        }
    }
}

/// One plugin that failed within a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFailure {
    /// `app (a, b, c)`, `infra <name>`, or `ledger`
    pub target: String,
    pub message: String,
}

impl fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct PhaseError {
    pub stage: Stage,
    pub failures: Vec<BranchFailure>,
}

impl PhaseError {
    /// Whether the branch named `target` is among the failures
    pub fn failed(&self, target: &str) -> bool {
        self.failures.iter().any(|f| f.target == target)
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed", self.stage)?;
        for failure in &self.failures {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum InfraStep {
    Compile,
    Execute,
    Destroy,
}

fn app_target(core: &Core) -> String {
    format!("app {}", core.tuple)
}

fn infra_target(decl: &InfrastructureDecl) -> String {
    format!("infra {}", decl.name)
}

impl Core {
    /// Run `phase` for every plugin it concerns.
    ///
    /// - `Compile`: the application, then each declared infrastructure
    /// - `Infra`: each declared infrastructure, concurrently
    /// - `Build`, `Deploy`: the application
    ///
    /// The attempt and its outcome are recorded in the run ledger.
    pub fn run(&self, phase: Phase) -> Result<(), PhaseError> {
        info!(phase = %phase, tuple = %self.tuple, "Phase started");
        self.report(self.sink.info(&format!("{}: starting", phase)));

        let mut failures = Vec::new();
        if let Err(err) = self
            .ledger
            .start_phase(&self.tuple, &self.descriptor, phase)
        {
            failures.push(ledger_failure(err));
        }

        match phase {
            Phase::Compile => {
                failures.extend(self.run_app(phase).err());
                for decl in &self.descriptor.infrastructure {
                    failures.extend(self.run_infra(phase, decl, InfraStep::Compile).err());
                }
            }
            Phase::Infra => failures.extend(self.provision_all()),
            Phase::Build | Phase::Deploy => failures.extend(self.run_app(phase).err()),
        }

        let summary = (!failures.is_empty()).then(|| {
            failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        });
        if let Err(err) = self
            .ledger
            .finish_phase(&self.tuple, &self.descriptor, phase, summary)
        {
            failures.push(ledger_failure(err));
        }

        if failures.is_empty() {
            info!(phase = %phase, "Phase succeeded");
            self.report(self.sink.info(&format!("{}: done", phase)));
            Ok(())
        } else {
            error!(phase = %phase, failures = failures.len(), "Phase failed");
            Err(PhaseError {
                stage: Stage::Phase(phase),
                failures,
            })
        }
    }

    /// Run every phase in order, skipping those the ledger already records
    /// as succeeded. Stops at the first phase that fails.
    ///
    /// Returns the phases that actually ran.
    pub fn resume(&self) -> DeckhandResult<Vec<Phase>> {
        let record = self.ledger.load(&self.tuple)?;
        let mut ran = Vec::new();

        for phase in Phase::ALL {
            if record.as_ref().is_some_and(|r| r.succeeded(phase)) {
                info!(phase = %phase, "Phase already succeeded, skipping");
                self.report(self.sink.info(&format!("{}: already done", phase)));
                continue;
            }
            self.run(phase)?;
            ran.push(phase);
        }

        Ok(ran)
    }

    /// Tear down every declared infrastructure, last declared first.
    ///
    /// A failing teardown does not stop the remaining ones. When every
    /// teardown succeeds the run record is dropped, so the next `resume`
    /// starts from scratch.
    pub fn destroy(&self) -> Result<(), PhaseError> {
        info!(tuple = %self.tuple, "Destroy started");

        let mut failures: Vec<BranchFailure> = self
            .descriptor
            .infrastructure
            .iter()
            .rev()
            .filter_map(|decl| self.run_infra(Phase::Infra, decl, InfraStep::Destroy).err())
            .collect();

        if failures.is_empty() {
            if let Err(err) = self.ledger.forget(&self.tuple) {
                failures.push(ledger_failure(err));
            }
        }

        if failures.is_empty() {
            info!(tuple = %self.tuple, "Destroy succeeded");
            self.report(self.sink.info("destroy: done"));
            Ok(())
        } else {
            error!(failures = failures.len(), "Destroy failed");
            Err(PhaseError {
                stage: Stage::Destroy,
                failures,
            })
        }
    }

    fn provision_all(&self) -> Vec<BranchFailure> {
        let decls = &self.descriptor.infrastructure;
        thread::scope(|scope| {
            let handles: Vec<_> = decls
                .iter()
                .map(|decl| {
                    scope.spawn(move || self.run_infra(Phase::Infra, decl, InfraStep::Execute))
                })
                .collect();

            handles
                .into_iter()
                .zip(decls)
                .filter_map(|(handle, decl)| match handle.join() {
                    Ok(outcome) => outcome.err(),
                    Err(_) => Some(self.fail(
                        Phase::Infra,
                        infra_target(decl),
                        "plugin panicked".to_string(),
                    )),
                })
                .collect()
        })
    }

    fn run_app(&self, phase: Phase) -> Result<(), BranchFailure> {
        let target = app_target(self);
        let app = self
            .resolve_app(&self.tuple)
            .map_err(|err| self.fail(phase, target.clone(), err.to_string()))?;
        let dir = self
            .plugin_dir(phase, "app")
            .map_err(|message| self.fail(phase, target.clone(), message))?;

        let ctx = PhaseContext::new(
            phase,
            &self.tuple,
            dir,
            self.sink.as_ref(),
            ScopedStore::new(self.directory.as_ref(), format!("app/{}", self.tuple.slug())),
        );
        let outcome = match phase {
            Phase::Compile => app.compile(&ctx),
            Phase::Build => app.build(&ctx),
            Phase::Deploy => app.deploy(&ctx),
            Phase::Infra => Ok(()),
        };
        outcome.map_err(|err| self.fail(phase, target, format!("{:#}", err)))
    }

    fn run_infra(
        &self,
        phase: Phase,
        decl: &InfrastructureDecl,
        step: InfraStep,
    ) -> Result<(), BranchFailure> {
        let target = infra_target(decl);
        let infra = self
            .resolve_infra(&decl.kind)
            .map_err(|err| self.fail(phase, target.clone(), err.to_string()))?;

        if !infra.flavors().iter().any(|f| f == &decl.flavor) {
            return Err(self.fail(
                phase,
                target,
                format!(
                    "flavor '{}' is not supported by infrastructure type '{}'",
                    decl.flavor, decl.kind
                ),
            ));
        }

        let dir = self
            .plugin_dir(phase, &format!("infra-{}", decl.name))
            .map_err(|message| self.fail(phase, target.clone(), message))?;

        let ctx = PhaseContext::new(
            phase,
            &self.tuple,
            dir,
            self.sink.as_ref(),
            ScopedStore::new(self.directory.as_ref(), format!("infra/{}", decl.name)),
        )
        .for_infra(&decl.name);

        let outcome = match step {
            InfraStep::Compile => infra.compile(&ctx),
            InfraStep::Execute => infra.execute(&ctx),
            InfraStep::Destroy => infra.destroy(&ctx),
        };
        outcome.map_err(|err| self.fail(phase, target, format!("{:#}", err)))
    }

    /// Per-plugin directory under the phase's working directory
    fn plugin_dir(&self, phase: Phase, name: &str) -> Result<PathBuf, String> {
        let dir = self.working_dir(phase.work_dir()).join(name);
        fs::create_dir_all(&dir)
            .map_err(|err| format!("cannot create {}: {}", dir.display(), err))?;
        Ok(dir)
    }

    /// Log and report a branch failure, then hand it back for collection
    fn fail(&self, phase: Phase, target: String, message: String) -> BranchFailure {
        warn!(phase = %phase, target = %target, error = %message, "Branch failed");
        let failure = BranchFailure { target, message };
        self.report(self.sink.error(&format!("{}: {}", phase, failure)));
        failure
    }

    fn report(&self, result: SinkResult<()>) {
        if let Err(err) = result {
            warn!(error = %err, "Output sink rejected a message");
        }
    }
}

fn ledger_failure(err: crate::application::LedgerError) -> BranchFailure {
    warn!(error = %err, "Run ledger update failed");
    BranchFailure {
        target: "ledger".to_string(),
        message: err.to_string(),
    }
}
