use serde::{Serialize, de::DeserializeOwned};

/// A value-level copy of a state object at the moment it was captured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Dynamic type of the captured state.
    pub type_name: &'static str,
    pub value: serde_json::Value,
}

impl StateSnapshot {
    pub fn capture<T: Serialize + ?Sized>(state: &T) -> Result<Self, serde_json::Error> {
        Self::capture_as(std::any::type_name::<T>(), state)
    }

    /// Capture with an explicit dynamic type name, for type-erased holders.
    pub fn capture_as<T: Serialize + ?Sized>(
        type_name: &'static str,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            type_name,
            value: serde_json::to_value(state)?,
        })
    }

    pub fn restore<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }

    /// Type name without module path, e.g. `Bank` for `my_app::Bank`.
    pub fn short_type_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub fn same_type(&self, other: &StateSnapshot) -> bool {
        self.type_name == other.type_name
    }
}

pub fn short_type_name(type_name: &'static str) -> &'static str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    match base.rfind("::") {
        Some(index) => &type_name[index + 2..],
        None => type_name,
    }
}

#[derive(Debug, thiserror::Error)]
#[error("state type changed from {expected} to {found}")]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
    pub value: serde_json::Value,
}

/// Current state, initial state and the append-only history of accepted
/// updates.
#[derive(Debug, Default)]
pub struct SiteState {
    current: Option<StateSnapshot>,
    initial: Option<StateSnapshot>,
    history: Vec<StateSnapshot>,
    initialized: bool,
}

impl SiteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, new_state: StateSnapshot) {
        if !self.initialized {
            self.initial = Some(new_state.clone());
            self.initialized = true;
        }
        self.history.push(new_state.clone());
        self.current = Some(new_state);
    }

    /// Check that `candidate` has the same dynamic type as every state
    /// accepted so far.
    pub fn check_type(&self, candidate: &StateSnapshot) -> Result<(), TypeMismatch> {
        let Some(previous) = self.history.last().or(self.initial.as_ref()) else {
            return Ok(());
        };

        if previous.same_type(candidate) {
            Ok(())
        } else {
            Err(TypeMismatch {
                expected: previous.type_name,
                found: candidate.type_name,
                value: candidate.value.clone(),
            })
        }
    }

    /// Restore the initial state, keeping the history as a log.
    pub fn reset(&mut self) {
        if let Some(initial) = self.initial.clone() {
            self.history.push(initial.clone());
            self.current = Some(initial);
        }
    }

    pub fn current(&self) -> Option<&StateSnapshot> {
        self.current.as_ref()
    }

    pub fn initial(&self) -> Option<&StateSnapshot> {
        self.initial.as_ref()
    }

    pub fn history(&self) -> &[StateSnapshot] {
        &self.history
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
