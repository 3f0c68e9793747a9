use crate::common::entity::{DscpMarking, QosTags, TimerGroup};

/// Classifier plugin types, in ascending priority order. Slot 0 is the
/// default classifier, present on every connection for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClassifierKind {
    Default,
    /// Acts on connection marks pushed in by the tracking subsystem.
    Mark,
    Dscp,
    /// Flow steering for multi-band/mesh setups.
    Steer,
}

impl ClassifierKind {
    pub const ALL: [Self; 4] = [Self::Default, Self::Mark, Self::Dscp, Self::Steer];

    pub fn ordinal(self) -> usize {
        match self {
            Self::Default => 0,
            Self::Mark => 1,
            Self::Dscp => 2,
            Self::Steer => 3,
        }
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Mark => "mark",
            Self::Dscp => "dscp",
            Self::Steer => "steer",
        }
    }
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How sure a classifier is that this connection concerns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    /// Not relevant; the classifier is unassigned (except the default).
    No,
    /// Undecided; blocks acceleration until the classifier makes up
    /// its mind.
    Maybe,
    Yes,
}

/// A classifier's vote on acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelPermit {
    Allow,
    Deny,
}

/// One classifier's verdict for one packet. Optional fields are
/// opinions; `None` means "no opinion", which never overrides another
/// classifier's choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifierResponse {
    pub relevance: Option<Relevance>,
    pub drop: bool,
    pub accel: Option<AccelPermit>,
    pub qos: Option<QosTags>,
    pub dscp: Option<DscpMarking>,
    /// A DSCP veto survives the whole pass regardless of ordering.
    pub deny_dscp: bool,
    pub timer_group: Option<TimerGroup>,
}

impl ClassifierResponse {
    pub fn relevant(relevance: Relevance) -> Self {
        Self {
            relevance: Some(relevance),
            ..Self::default()
        }
    }

    pub fn relevance(&self) -> Relevance {
        // An empty response means the classifier stays assigned but has
        // nothing to say this packet.
        self.relevance.unwrap_or(Relevance::Yes)
    }
}

/// The merged decision for one packet after every assigned classifier
/// has been consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateVerdict {
    pub drop: bool,
    pub accel: bool,
    pub qos: QosTags,
    pub dscp: Option<DscpMarking>,
    pub timer_group: Option<TimerGroup>,
}
