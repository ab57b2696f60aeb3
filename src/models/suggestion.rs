use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ExerciseInput, WorkoutDifficulty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessGoal {
    Hypertrophy,
    Strength,
    WeightLoss,
    Endurance,
    Mobility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    Legs,
    Chest,
    Back,
    Shoulders,
    Arms,
    Core,
    FullBody,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SuggestionRequest {
    pub goal: FitnessGoal,
    pub level: WorkoutDifficulty,
    pub focus: Option<MuscleGroup>,
    #[validate(range(min = 15, max = 180))]
    pub available_minutes: Option<u32>,
}

/// Ready-to-create workout draft produced by the suggestion generator
#[derive(Debug, Clone, Serialize)]
pub struct SuggestedWorkout {
    pub name: String,
    pub description: String,
    pub difficulty: WorkoutDifficulty,
    pub estimated_minutes: i32,
    pub exercises: Vec<ExerciseInput>,
    pub rationale: String,
}
