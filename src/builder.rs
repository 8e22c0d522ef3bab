//! Draft editing and submission of a new contest.

use chrono::Local;

use crate::{
    contest::{LineSetup, NewContest, NumericInput, new_line_id},
    repository::ContestRepository,
    types::{
        CatchType, EntryId, HookBait, LineId, WaterCharacteristic, WeatherCondition,
        dedup_preserving_order,
    },
    weather::{WeatherEstimator, WeatherGuard, WeatherSnapshot, WeatherTicket},
};

/// Rig configuration while it is being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDraft {
    /// Identifier, stable across edits.
    pub id: LineId,
    /// Float size in grams.
    pub float_size: NumericInput,
    /// Main line diameter.
    pub main_line: NumericInput,
    /// Pole length in meters.
    pub length_meters: NumericInput,
    /// Hook model and size.
    pub hook: String,
    /// Shotting pattern.
    pub rig_notes: String,
    /// Free remarks.
    pub remarks: String,
}

impl LineDraft {
    /// Blank line with a fresh id and every measurement unset.
    pub fn empty() -> Self {
        Self {
            id: new_line_id(),
            float_size: NumericInput::Unset,
            main_line: NumericInput::Unset,
            length_meters: NumericInput::Unset,
            hook: String::new(),
            rig_notes: String::new(),
            remarks: String::new(),
        }
    }

    fn normalize(&self) -> LineSetup {
        LineSetup {
            id: self.id.clone(),
            float_size: self.float_size.value(),
            main_line: self.main_line.value(),
            length_meters: self.length_meters.value(),
            hook: self.hook.clone(),
            rig_notes: self.rig_notes.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

/// Contest being assembled before it is saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ContestDraft {
    /// ISO calendar date.
    pub date: String,
    /// Free-text place name.
    pub location: String,
    /// Raw weight input, coerced on submit.
    pub total_weight: String,
    /// Free-text result label.
    pub ranking: String,
    /// Water state.
    pub water_characteristic: WaterCharacteristic,
    /// Measured temperature.
    pub temperature: NumericInput,
    /// Observed weather.
    pub weather_conditions: Vec<WeatherCondition>,
    /// Rig configurations, never empty.
    pub lines: Vec<LineDraft>,
    /// Groundbait composition.
    pub groundbait_recipe: String,
    /// Feeding strategy.
    pub feeding_strategy: String,
    /// Hook baits used.
    pub hook_baits: Vec<HookBait>,
    /// Species caught.
    pub catches: Vec<CatchType>,
}

impl Default for ContestDraft {
    fn default() -> Self {
        Self {
            date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            location: String::new(),
            total_weight: "0".to_string(),
            ranking: String::new(),
            water_characteristic: WaterCharacteristic::default(),
            temperature: NumericInput::Absent,
            weather_conditions: Vec::new(),
            lines: vec![LineDraft::empty()],
            groundbait_recipe: String::new(),
            feeding_strategy: String::new(),
            hook_baits: Vec::new(),
            catches: Vec::new(),
        }
    }
}

impl ContestDraft {
    /// Coerces the draft into the payload handed to the repository.
    ///
    /// Unparseable or negative weight becomes 0; unset measurements become
    /// absent; repeated selections are dropped.
    pub fn normalize(&self) -> NewContest {
        let total_weight = self
            .total_weight
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(0.0);

        NewContest {
            date: self.date.clone(),
            location: self.location.clone(),
            total_weight,
            ranking: self.ranking.clone(),
            water_characteristic: self.water_characteristic,
            temperature: self.temperature.value(),
            weather_conditions: dedup_preserving_order(&self.weather_conditions),
            lines: self.lines.iter().map(LineDraft::normalize).collect(),
            groundbait_recipe: self.groundbait_recipe.clone(),
            feeding_strategy: self.feeding_strategy.clone(),
            hook_baits: dedup_preserving_order(&self.hook_baits),
            catches: dedup_preserving_order(&self.catches),
        }
    }
}

/// Header field update for [`EntryBuilder::set_field`].
#[derive(Debug, Clone, PartialEq)]
pub enum DraftField {
    /// ISO calendar date.
    Date(String),
    /// Place name.
    Location(String),
    /// Raw weight text.
    TotalWeight(String),
    /// Result label.
    Ranking(String),
    /// Water state.
    WaterCharacteristic(WaterCharacteristic),
    /// Measured temperature.
    Temperature(NumericInput),
    /// Selected weather conditions.
    WeatherConditions(Vec<WeatherCondition>),
    /// Groundbait composition.
    GroundbaitRecipe(String),
    /// Feeding strategy.
    FeedingStrategy(String),
    /// Selected hook baits.
    HookBaits(Vec<HookBait>),
    /// Selected species.
    Catches(Vec<CatchType>),
}

/// Line field update for [`EntryBuilder::set_line_field`].
#[derive(Debug, Clone, PartialEq)]
pub enum LineField {
    /// Float size.
    FloatSize(NumericInput),
    /// Main line diameter.
    MainLine(NumericInput),
    /// Pole length.
    LengthMeters(NumericInput),
    /// Hook.
    Hook(String),
    /// Shotting pattern.
    RigNotes(String),
    /// Remarks.
    Remarks(String),
}

/// Failure to save a draft. The draft is left untouched for a retry.
#[derive(Debug, thiserror::Error)]
#[error("The contest could not be saved. Check the connection to the contest store and try again.")]
pub struct SubmitError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

/// Weather lookup the caller should run for the current draft.
#[derive(Debug, Clone)]
pub struct WeatherRequest {
    /// Ticket to hand back to [`EntryBuilder::apply_weather`].
    pub ticket: WeatherTicket,
    /// Trimmed location.
    pub location: String,
    /// Draft date.
    pub date: String,
}

type SavedCallback = Box<dyn FnMut(EntryId) + Send>;

/// Accumulates one contest and persists it on submit.
pub struct EntryBuilder {
    draft: ContestDraft,
    weather: Option<WeatherSnapshot>,
    weather_guard: WeatherGuard,
    on_saved: Option<SavedCallback>,
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryBuilder")
            .field("draft", &self.draft)
            .field("weather", &self.weather)
            .finish_non_exhaustive()
    }
}

impl EntryBuilder {
    /// Builder holding a fresh draft.
    pub fn new() -> Self {
        Self {
            draft: ContestDraft::default(),
            weather: None,
            weather_guard: WeatherGuard::default(),
            on_saved: None,
        }
    }

    /// Registers the callback fired after each successful save.
    pub fn on_saved(mut self, callback: impl FnMut(EntryId) + Send + 'static) -> Self {
        self.on_saved = Some(Box::new(callback));
        self
    }

    /// Current draft.
    pub fn draft(&self) -> &ContestDraft {
        &self.draft
    }

    /// Weather shown for the current location and date, if any.
    pub fn weather(&self) -> Option<&WeatherSnapshot> {
        self.weather.as_ref()
    }

    /// Updates one header field.
    pub fn set_field(&mut self, field: DraftField) {
        let d = &mut self.draft;
        match field {
            DraftField::Date(v) => {
                d.date = v;
                self.weather_guard.invalidate();
            }
            DraftField::Location(v) => {
                d.location = v;
                self.weather_guard.invalidate();
            }
            DraftField::TotalWeight(v) => d.total_weight = v,
            DraftField::Ranking(v) => d.ranking = v,
            DraftField::WaterCharacteristic(v) => d.water_characteristic = v,
            DraftField::Temperature(v) => d.temperature = v,
            DraftField::WeatherConditions(v) => d.weather_conditions = v,
            DraftField::GroundbaitRecipe(v) => d.groundbait_recipe = v,
            DraftField::FeedingStrategy(v) => d.feeding_strategy = v,
            DraftField::HookBaits(v) => d.hook_baits = v,
            DraftField::Catches(v) => d.catches = v,
        }
    }

    /// Updates one field of line `id`. Returns false when no such line.
    pub fn set_line_field(&mut self, id: &str, field: LineField) -> bool {
        let Some(line) = self.draft.lines.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        match field {
            LineField::FloatSize(v) => line.float_size = v,
            LineField::MainLine(v) => line.main_line = v,
            LineField::LengthMeters(v) => line.length_meters = v,
            LineField::Hook(v) => line.hook = v,
            LineField::RigNotes(v) => line.rig_notes = v,
            LineField::Remarks(v) => line.remarks = v,
        }
        true
    }

    /// Appends a blank line and returns its id.
    pub fn add_line(&mut self) -> LineId {
        let line = LineDraft::empty();
        let id = line.id.clone();
        self.draft.lines.push(line);
        id
    }

    /// Removes line `id` unless it is the last one. Returns whether a line
    /// was removed.
    pub fn remove_line(&mut self, id: &str) -> bool {
        if self.draft.lines.len() <= 1 {
            return false;
        }
        let before = self.draft.lines.len();
        self.draft.lines.retain(|l| l.id != id);
        self.draft.lines.len() != before
    }

    /// Discards the draft and any weather shown.
    pub fn reset(&mut self) {
        self.draft = ContestDraft::default();
        self.weather = None;
        self.weather_guard.invalidate();
    }

    /// Normalizes and appends the draft through `repo`.
    ///
    /// On success the draft is reset and the saved callback fires. On
    /// failure the draft is kept as is.
    pub async fn submit<R>(&mut self, repo: &R) -> Result<EntryId, SubmitError>
    where
        R: ContestRepository + Sync,
    {
        let contest = self.draft.normalize();
        match repo.append(contest).await {
            Ok(id) => {
                tracing::info!(id, "Contest saved");
                self.reset();
                if let Some(callback) = self.on_saved.as_mut() {
                    callback(id);
                }
                Ok(id)
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to save contest");
                Err(SubmitError {
                    source: Box::new(err),
                })
            }
        }
    }

    /// Starts a weather lookup for the current draft, superseding any in
    /// flight. Returns `None`, and clears the shown weather, when the date
    /// or the trimmed location is empty.
    pub fn weather_request(&mut self) -> Option<WeatherRequest> {
        let location = self.draft.location.trim();
        if self.draft.date.is_empty() || location.is_empty() {
            self.weather_guard.invalidate();
            self.weather = None;
            return None;
        }
        Some(WeatherRequest {
            ticket: self.weather_guard.begin(),
            location: location.to_string(),
            date: self.draft.date.clone(),
        })
    }

    /// Shows `snapshot` if `ticket` is still current. Stale results are
    /// dropped and `false` is returned.
    pub fn apply_weather(&mut self, ticket: &WeatherTicket, snapshot: WeatherSnapshot) -> bool {
        if !self.weather_guard.is_current(ticket) {
            tracing::debug!("Dropping stale weather result");
            return false;
        }
        self.weather = Some(snapshot);
        true
    }

    /// Runs a lookup for the current draft and shows its result.
    pub async fn refresh_weather(&mut self, estimator: &WeatherEstimator) -> bool {
        let Some(req) = self.weather_request() else {
            return false;
        };
        let snapshot = estimator.fetch(&req.location, &req.date).await;
        self.apply_weather(&req.ticket, snapshot)
    }
}
