//! The Resource body: fields common to every non-namespace entry kind,
//! plus the four variant tails (Input, Output, Observation,
//! Placeholder). Modeled as a closed tagged union rather than a trait
//! object — the set of kinds is fixed and dispatch sits on the push
//! hot path.

use std::rc::Weak;
use std::cell::RefCell;

use hub_config::FilterKind;
use hub_types::{DataSample, ExtractSpec, SampleType};

use crate::entry::EntryData;
use crate::handler::{HandlerRegistry, SampleBuffer};

pub type Transform = FilterKind;

/// Fields every resource kind carries, regardless of variant.
#[derive(Default)]
pub struct ResourceCommon {
    pub units: String,
    pub current: Option<DataSample>,
    pub default: Option<DataSample>,
    pub override_value: Option<DataSample>,
    pub source: Option<Weak<RefCell<EntryData>>>,
    pub downstream: Vec<Weak<RefCell<EntryData>>>,
    pub handlers: HandlerRegistry,
    /// Single latest-pending sample while an update barrier is active.
    pub pending: Option<DataSample>,
    /// Sample JSON document an admin has attached to this path to
    /// describe the shape of values pushed here; surfaced by a
    /// snapshot once set.
    pub json_example: Option<String>,
}

impl ResourceCommon {
    /// The value a reader should see: override takes precedence over
    /// the live current value, which takes precedence over the
    /// default.
    pub fn effective_value(&self) -> Option<&DataSample> {
        self.override_value.as_ref().or(self.current.as_ref()).or(self.default.as_ref())
    }
}

pub struct InputState {
    pub data_type: SampleType,
}

pub struct OutputState {
    pub data_type: SampleType,
    pub mandatory: bool,
}

pub struct ObservationState {
    pub min_period: f64,
    pub change_by: Option<f64>,
    pub low_limit: Option<f64>,
    pub high_limit: Option<f64>,
    pub transform: Transform,
    pub extraction: Option<ExtractSpec>,
    pub destination_label: Option<String>,
    pub config_provenance: bool,
    pub buffer: SampleBuffer,
    pub backup_period: f64,
    pub last_backup: f64,
    pub last_accepted: Option<DataSample>,
    pub data_type: Option<SampleType>,
}

impl Default for ObservationState {
    fn default() -> Self {
        ObservationState {
            min_period: 0.0,
            change_by: None,
            low_limit: None,
            high_limit: None,
            transform: Transform::None,
            extraction: None,
            destination_label: None,
            config_provenance: false,
            buffer: SampleBuffer::new(0),
            backup_period: 0.0,
            last_backup: 0.0,
            last_accepted: None,
            data_type: None,
        }
    }
}

#[derive(Default)]
pub struct PlaceholderState {
    pub last_data_type: Option<SampleType>,
}

pub enum ResourceVariant {
    Input(InputState),
    Output(OutputState),
    Observation(ObservationState),
    Placeholder(PlaceholderState),
}

pub struct Resource {
    pub common: ResourceCommon,
    pub variant: ResourceVariant,
}

impl Resource {
    pub fn input(data_type: SampleType, units: String) -> Self {
        Resource {
            common: ResourceCommon { units, ..Default::default() },
            variant: ResourceVariant::Input(InputState { data_type }),
        }
    }

    pub fn output(data_type: SampleType, units: String, mandatory: bool) -> Self {
        Resource {
            common: ResourceCommon { units, ..Default::default() },
            variant: ResourceVariant::Output(OutputState { data_type, mandatory }),
        }
    }

    pub fn observation() -> Self {
        Resource {
            common: ResourceCommon::default(),
            variant: ResourceVariant::Observation(ObservationState::default()),
        }
    }

    pub fn placeholder() -> Self {
        Resource {
            common: ResourceCommon::default(),
            variant: ResourceVariant::Placeholder(PlaceholderState::default()),
        }
    }

    pub fn data_type(&self) -> Option<SampleType> {
        match &self.variant {
            ResourceVariant::Input(s) => Some(s.data_type),
            ResourceVariant::Output(s) => Some(s.data_type),
            ResourceVariant::Observation(s) => s.data_type,
            ResourceVariant::Placeholder(s) => s.last_data_type,
        }
    }

    pub fn units_for_routing(&self) -> String {
        self.common.units.clone()
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.variant {
            ResourceVariant::Input(_) => "input",
            ResourceVariant::Output(_) => "output",
            ResourceVariant::Observation(_) => "observation",
            ResourceVariant::Placeholder(_) => "placeholder",
        }
    }

    pub fn as_observation(&self) -> Option<&ObservationState> {
        match &self.variant {
            ResourceVariant::Observation(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_observation_mut(&mut self) -> Option<&mut ObservationState> {
        match &mut self.variant {
            ResourceVariant::Observation(o) => Some(o),
            _ => None,
        }
    }

    /// Move admin settings (source, default, override, handlers) onto
    /// a fresh Placeholder body, discarding anything variant-specific
    /// (filters, buffer) that doesn't apply off an I/O resource.
    pub fn demote_to_placeholder(&mut self) {
        let data_type = self.data_type();
        let mut common = std::mem::take(&mut self.common);
        common.current = None;
        self.common = common;
        self.variant = ResourceVariant::Placeholder(PlaceholderState { last_data_type: data_type });
    }

    /// Move admin settings from a Placeholder onto a freshly-promoted
    /// Input/Output/Observation body.
    pub fn promote_from_placeholder(placeholder: Resource, variant: ResourceVariant) -> Resource {
        Resource { common: placeholder.common, variant }
    }
}
