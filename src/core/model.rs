use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{DispatchError, DispatchResult};
use super::history::HistoryLog;

pub type PlotId = u64;
pub type CallId = u64;
pub type EmployeeId = u64;

pub const BATTERY_FULL: u8 = 100;

lazy_static! {
    static ref COLOR_RE: Regex = Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("Invalid color regex");
}

/// Operator-defined status shown instead of the built-in ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomStatus {
    pub name: String,
    /// `#RRGGBB`
    pub color: String,
}

impl CustomStatus {
    pub fn new(name: &str, color: &str) -> DispatchResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DispatchError::invalid("status name", "must not be empty"));
        }
        let color = color.trim();
        if !COLOR_RE.is_match(color) {
            return Err(DispatchError::invalid(
                "status color",
                format!("expected #RRGGBB, got {color:?}"),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            color: color.to_string(),
        })
    }
}

/// Plot status. A custom status carries its own name and color, so a plot
/// can never be `Custom` without them or hold them under another status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotStatus {
    /// Armed and monitored.
    Active,
    /// Disarmed.
    Inactive,
    /// Response team dispatched.
    Emergency,
    LowBattery,
    Custom(CustomStatus),
}

impl PlotStatus {
    pub fn label(&self) -> &str {
        match self {
            Self::Active => "Armed",
            Self::Inactive => "Disarmed",
            Self::Emergency => "Response dispatched",
            Self::LowBattery => "Battery low",
            Self::Custom(custom) => &custom.name,
        }
    }

    pub fn color(&self) -> &str {
        match self {
            Self::Active => "#10B981",
            Self::Inactive => "#3B82F6",
            Self::Emergency => "#EF4444",
            Self::LowBattery => "#F59E0B",
            Self::Custom(custom) => &custom.color,
        }
    }

    /// Sort group for the default plot ordering.
    fn priority(&self) -> u8 {
        match self {
            Self::Emergency => 0,
            Self::LowBattery => 1,
            _ => 2,
        }
    }
}

/// Who raised an alarm on a plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmCause {
    /// Operator pressed the emergency button.
    Manual,
    /// Raised by the alarm scheduler.
    Auto,
}

impl AlarmCause {
    pub fn call_type(self) -> CallType {
        match self {
            Self::Manual => CallType::Emergency,
            Self::Auto => CallType::Alarm,
        }
    }

    fn history_action(self) -> &'static str {
        match self {
            Self::Manual => "Emergency call dispatched",
            Self::Auto => "Alarm triggered",
        }
    }
}

/// A monitored premises with its alarm panel.
#[derive(Debug, Clone, Serialize)]
pub struct Plot {
    pub id: PlotId,
    pub address: String,
    pub phone: String,
    pub status: PlotStatus,
    /// Always within `0..=100`.
    pub battery: u8,
    /// Newest first.
    pub history: HistoryLog,
}

impl Plot {
    pub(crate) fn new(
        id: PlotId,
        address: String,
        phone: String,
        history_capacity: usize,
        at: DateTime<Utc>,
    ) -> Self {
        let mut history = HistoryLog::new(history_capacity);
        history.append("Plot created", at);
        Self {
            id,
            address,
            phone,
            status: PlotStatus::Inactive,
            battery: BATTERY_FULL,
            history,
        }
    }

    pub fn custom_status(&self) -> Option<&CustomStatus> {
        match &self.status {
            PlotStatus::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    /// Flip between armed and disarmed. Any other status has to be reset
    /// explicitly first (see [`Plot::set_armed`]).
    pub(crate) fn toggle(&mut self, at: DateTime<Utc>) -> DispatchResult<()> {
        let armed = match self.status {
            PlotStatus::Active => false,
            PlotStatus::Inactive => true,
            ref other => {
                return Err(DispatchError::conflict(format!(
                    "plot {} cannot be toggled while {}",
                    self.id,
                    other.label()
                )))
            }
        };
        self.arm(armed, at);
        Ok(())
    }

    /// Force the plot armed or disarmed. Rejected during an emergency,
    /// which only ends through call resolution.
    pub(crate) fn set_armed(&mut self, armed: bool, at: DateTime<Utc>) -> DispatchResult<()> {
        if self.status == PlotStatus::Emergency {
            return Err(DispatchError::conflict(format!(
                "plot {} has an open emergency; resolve it first",
                self.id
            )));
        }
        let target = if armed {
            PlotStatus::Active
        } else {
            PlotStatus::Inactive
        };
        if self.status != target {
            self.arm(armed, at);
        }
        Ok(())
    }

    fn arm(&mut self, armed: bool, at: DateTime<Utc>) {
        if armed {
            self.status = PlotStatus::Active;
            self.history.append("Armed", at);
        } else {
            self.status = PlotStatus::Inactive;
            self.history.append("Disarmed", at);
        }
    }

    pub(crate) fn raise_alarm(&mut self, cause: AlarmCause, at: DateTime<Utc>) {
        self.status = PlotStatus::Emergency;
        self.history.append(cause.history_action(), at);
    }

    pub(crate) fn charge(&mut self, at: DateTime<Utc>) {
        self.battery = BATTERY_FULL;
        if self.status == PlotStatus::LowBattery {
            self.status = PlotStatus::Active;
        }
        self.history.append("Battery charged", at);
    }

    pub(crate) fn discharge(&mut self, step: u8, at: DateTime<Utc>) {
        self.battery = self.battery.saturating_sub(step);
        self.history.append("Battery discharged", at);
    }

    /// Returns `true` when this drift moved the plot into `LowBattery`.
    pub(crate) fn drift(&mut self, delta: u8, threshold: u8, at: DateTime<Utc>) -> bool {
        self.battery = self.battery.saturating_sub(delta);
        let entering_low = self.battery <= threshold
            && !matches!(self.status, PlotStatus::Emergency | PlotStatus::LowBattery);
        if entering_low {
            self.status = PlotStatus::LowBattery;
            self.history.append("Battery low", at);
        }
        entering_low
    }

    /// Rejected during an emergency so the plot cannot be walked out of it
    /// through another status.
    pub(crate) fn set_custom(&mut self, custom: CustomStatus, at: DateTime<Utc>) -> DispatchResult<()> {
        if self.status == PlotStatus::Emergency {
            return Err(DispatchError::conflict(format!(
                "plot {} has an open emergency; resolve it first",
                self.id
            )));
        }
        self.history.append(&format!("Status set: {}", custom.name), at);
        self.status = PlotStatus::Custom(custom);
        Ok(())
    }

    pub(crate) fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = PlotStatus::Active;
        self.history.append("End of alert", at);
    }
}

/// Plot ordering for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotSort {
    /// Emergencies, then low batteries, then everything else; by id within a group.
    #[default]
    Priority,
    Id,
}

impl PlotSort {
    pub fn sort(self, plots: &mut [Plot]) {
        match self {
            Self::Priority => plots.sort_by_key(|p| (p.status.priority(), p.id)),
            Self::Id => plots.sort_by_key(|p| p.id),
        }
    }
}

/// Plot counts by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlotStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub emergency: usize,
    pub low_battery: usize,
    pub custom: usize,
}

impl PlotStats {
    pub(crate) fn count(&mut self, status: &PlotStatus) {
        self.total += 1;
        match status {
            PlotStatus::Active => self.active += 1,
            PlotStatus::Inactive => self.inactive += 1,
            PlotStatus::Emergency => self.emergency += 1,
            PlotStatus::LowBattery => self.low_battery += 1,
            PlotStatus::Custom(_) => self.custom += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Emergency,
    Alarm,
}

/// Dispatch record for a plot in emergency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyCall {
    pub id: CallId,
    pub plot_id: PlotId,
    pub call_type: CallType,
    pub created_at: DateTime<Utc>,
    pub assigned_employee: Option<EmployeeId>,
}

impl EmergencyCall {
    pub fn is_assigned(&self) -> bool {
        self.assigned_employee.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallFilter {
    #[default]
    All,
    Assigned,
    Unassigned,
}

impl CallFilter {
    pub fn matches(self, call: &EmergencyCall) -> bool {
        match self {
            Self::All => true,
            Self::Assigned => call.is_assigned(),
            Self::Unassigned => !call.is_assigned(),
        }
    }
}

/// Response team ranks, junior to senior. Ordering is presentational only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    #[default]
    Private,
    Corporal,
    JuniorSergeant,
    Sergeant,
    SeniorSergeant,
    SergeantMajor,
    WarrantOfficer,
    SeniorWarrantOfficer,
    JuniorLieutenant,
    Lieutenant,
    SeniorLieutenant,
    Captain,
    Major,
    LieutenantColonel,
    Colonel,
    MajorGeneral,
    LieutenantGeneral,
    ColonelGeneral,
    General,
}

impl Rank {
    pub fn all() -> &'static [Rank] {
        &[
            Self::Private,
            Self::Corporal,
            Self::JuniorSergeant,
            Self::Sergeant,
            Self::SeniorSergeant,
            Self::SergeantMajor,
            Self::WarrantOfficer,
            Self::SeniorWarrantOfficer,
            Self::JuniorLieutenant,
            Self::Lieutenant,
            Self::SeniorLieutenant,
            Self::Captain,
            Self::Major,
            Self::LieutenantColonel,
            Self::Colonel,
            Self::MajorGeneral,
            Self::LieutenantGeneral,
            Self::ColonelGeneral,
            Self::General,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Private => "Private",
            Self::Corporal => "Corporal",
            Self::JuniorSergeant => "Junior Sergeant",
            Self::Sergeant => "Sergeant",
            Self::SeniorSergeant => "Senior Sergeant",
            Self::SergeantMajor => "Sergeant Major",
            Self::WarrantOfficer => "Warrant Officer",
            Self::SeniorWarrantOfficer => "Senior Warrant Officer",
            Self::JuniorLieutenant => "Junior Lieutenant",
            Self::Lieutenant => "Lieutenant",
            Self::SeniorLieutenant => "Senior Lieutenant",
            Self::Captain => "Captain",
            Self::Major => "Major",
            Self::LieutenantColonel => "Lieutenant Colonel",
            Self::Colonel => "Colonel",
            Self::MajorGeneral => "Major General",
            Self::LieutenantGeneral => "Lieutenant General",
            Self::ColonelGeneral => "Colonel General",
            Self::General => "General",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Rank {
    type Err = DispatchError;

    /// Accepts the display name in any case, with spaces, dashes or underscores.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        Self::all()
            .iter()
            .copied()
            .find(|rank| {
                let name: String = rank
                    .display_name()
                    .chars()
                    .filter(|c| *c != ' ')
                    .flat_map(char::to_lowercase)
                    .collect();
                name == wanted
            })
            .ok_or_else(|| DispatchError::invalid("rank", format!("unknown rank {s:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub rank: Rank,
}
