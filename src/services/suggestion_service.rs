use validator::Validate;

use crate::errors::AppResult;
use crate::models::{ExerciseInput, FitnessGoal, MuscleGroup, SuggestedWorkout, SuggestionRequest, WorkoutDifficulty};

const DEFAULT_AVAILABLE_MINUTES: u32 = 45;
const WARM_UP_MINUTES: u32 = 5;
const MIN_EXERCISES: usize = 3;
const MAX_EXERCISES: usize = 8;
/// Time under tension per set, in seconds
const WORK_SECONDS_PER_SET: u32 = 45;

struct LibraryExercise {
    name: &'static str,
    group: MuscleGroup,
    min_level: WorkoutDifficulty,
}

const fn entry(name: &'static str, group: MuscleGroup, min_level: WorkoutDifficulty) -> LibraryExercise {
    LibraryExercise { name, group, min_level }
}

use MuscleGroup::*;
use WorkoutDifficulty::{Advanced, Beginner, Intermediate};

// Ordered by priority inside each group; compounds first.
static STRENGTH_LIBRARY: &[LibraryExercise] = &[
    entry("Back Squat", Legs, Beginner),
    entry("Romanian Deadlift", Legs, Intermediate),
    entry("Walking Lunge", Legs, Beginner),
    entry("Leg Press", Legs, Beginner),
    entry("Standing Calf Raise", Legs, Beginner),
    entry("Bench Press", Chest, Beginner),
    entry("Incline Dumbbell Press", Chest, Beginner),
    entry("Weighted Dip", Chest, Advanced),
    entry("Push-up", Chest, Beginner),
    entry("Cable Fly", Chest, Beginner),
    entry("Barbell Row", Back, Beginner),
    entry("Pull-up", Back, Intermediate),
    entry("Conventional Deadlift", Back, Intermediate),
    entry("Lat Pulldown", Back, Beginner),
    entry("Face Pull", Back, Beginner),
    entry("Overhead Press", Shoulders, Beginner),
    entry("Push Press", Shoulders, Advanced),
    entry("Lateral Raise", Shoulders, Beginner),
    entry("Rear Delt Fly", Shoulders, Beginner),
    entry("Barbell Curl", Arms, Beginner),
    entry("Close-Grip Bench Press", Arms, Intermediate),
    entry("Hammer Curl", Arms, Beginner),
    entry("Triceps Pushdown", Arms, Beginner),
    entry("Plank", Core, Beginner),
    entry("Hanging Leg Raise", Core, Intermediate),
    entry("Dead Bug", Core, Beginner),
    entry("Pallof Press", Core, Beginner),
];

static MOBILITY_LIBRARY: &[LibraryExercise] = &[
    entry("Cat-Cow", FullBody, Beginner),
    entry("World's Greatest Stretch", FullBody, Beginner),
    entry("Hip 90/90 Switch", Legs, Beginner),
    entry("Deep Squat Hold", Legs, Beginner),
    entry("Thoracic Rotation", Back, Beginner),
    entry("Band Shoulder Dislocate", Shoulders, Beginner),
    entry("Cossack Squat", Legs, Intermediate),
    entry("Jefferson Curl", Back, Advanced),
];

/// Round-robin order used when no focus is given
const FULL_BODY_ROTATION: [MuscleGroup; 6] = [Legs, Back, Chest, Shoulders, Core, Arms];

/// Sets, reps and rest for a goal at a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prescription {
    pub sets: i32,
    pub reps: i32,
    pub rest_seconds: i32,
}

pub fn prescription(goal: FitnessGoal, level: WorkoutDifficulty) -> Prescription {
    let (base_sets, reps, rest_seconds) = match goal {
        FitnessGoal::Hypertrophy => (3, 10, 90),
        FitnessGoal::Strength => (4, 5, 150),
        FitnessGoal::WeightLoss => (3, 15, 45),
        FitnessGoal::Endurance => (2, 20, 30),
        FitnessGoal::Mobility => (2, 8, 30),
    };

    let sets = match level {
        Beginner => (base_sets - 1).max(2),
        Intermediate => base_sets,
        Advanced => base_sets + 1,
    };

    Prescription { sets, reps, rest_seconds }
}

fn level_rank(level: WorkoutDifficulty) -> u8 {
    match level {
        Beginner => 0,
        Intermediate => 1,
        Advanced => 2,
    }
}

fn label(goal: FitnessGoal) -> &'static str {
    match goal {
        FitnessGoal::Hypertrophy => "hypertrophy",
        FitnessGoal::Strength => "strength",
        FitnessGoal::WeightLoss => "fat loss",
        FitnessGoal::Endurance => "muscular endurance",
        FitnessGoal::Mobility => "mobility",
    }
}

fn group_label(group: MuscleGroup) -> &'static str {
    match group {
        Legs => "legs",
        Chest => "chest",
        Back => "back",
        Shoulders => "shoulders",
        Arms => "arms",
        Core => "core",
        FullBody => "full body",
    }
}

fn level_label(level: WorkoutDifficulty) -> &'static str {
    match level {
        Beginner => "Beginner",
        Intermediate => "Intermediate",
        Advanced => "Advanced",
    }
}

/// Candidate exercises in the order they should be picked
fn candidates(goal: FitnessGoal, level: WorkoutDifficulty, focus: Option<MuscleGroup>) -> Vec<&'static LibraryExercise> {
    let allowed = |exercise: &&LibraryExercise| level_rank(exercise.min_level) <= level_rank(level);

    if goal == FitnessGoal::Mobility {
        return MOBILITY_LIBRARY.iter().filter(allowed).collect();
    }

    match focus {
        Some(group) if group != FullBody => {
            let mut focused: Vec<_> = STRENGTH_LIBRARY
                .iter()
                .filter(allowed)
                .filter(|e| e.group == group)
                .collect();
            // Finish a focused session with core work
            if group != Core {
                focused.extend(STRENGTH_LIBRARY.iter().filter(allowed).filter(|e| e.group == Core));
            }
            focused
        }
        _ => {
            let per_group: Vec<Vec<&LibraryExercise>> = FULL_BODY_ROTATION
                .iter()
                .map(|group| STRENGTH_LIBRARY.iter().filter(allowed).filter(|e| e.group == *group).collect())
                .collect();

            let depth = per_group.iter().map(Vec::len).max().unwrap_or(0);
            let mut rotated = Vec::new();
            for round in 0..depth {
                for group in &per_group {
                    if let Some(exercise) = group.get(round) {
                        rotated.push(*exercise);
                    }
                }
            }
            rotated
        }
    }
}

fn exercise_minutes(prescription: Prescription) -> u32 {
    let seconds = prescription.sets as u32 * (WORK_SECONDS_PER_SET + prescription.rest_seconds as u32);
    seconds.div_ceil(60)
}

/// Build a deterministic workout draft for the request
pub fn suggest_workout(request: &SuggestionRequest) -> SuggestedWorkout {
    let available = request.available_minutes.unwrap_or(DEFAULT_AVAILABLE_MINUTES);
    let plan = prescription(request.goal, request.level);
    let per_exercise = exercise_minutes(plan);

    let budget = available.saturating_sub(WARM_UP_MINUTES);
    let fitting = (budget / per_exercise.max(1)) as usize;
    let pool = candidates(request.goal, request.level, request.focus);
    let count = fitting.clamp(MIN_EXERCISES, MAX_EXERCISES).min(pool.len());

    let exercises: Vec<ExerciseInput> = pool
        .into_iter()
        .take(count)
        .map(|exercise| ExerciseInput {
            name: exercise.name.to_string(),
            sets: plan.sets,
            reps: plan.reps,
            rest_seconds: Some(plan.rest_seconds),
            weight_kg: None,
            notes: (request.goal == FitnessGoal::Mobility).then(|| "Slow and controlled, reps per side".to_string()),
        })
        .collect();

    let focus = request.focus.unwrap_or(FullBody);
    let estimated_minutes = (WARM_UP_MINUTES + per_exercise * exercises.len() as u32) as i32;

    SuggestedWorkout {
        name: format!("{} {}: {}", level_label(request.level), label(request.goal), group_label(focus)),
        description: format!(
            "{} exercises of {}x{} with {}s rest, plus a {} minute warm-up",
            exercises.len(),
            plan.sets,
            plan.reps,
            plan.rest_seconds,
            WARM_UP_MINUTES
        ),
        difficulty: request.level,
        estimated_minutes,
        rationale: format!(
            "{} reps per set suit a {} goal; {} sets match a {} trainee and {} exercises fit in {} minutes.",
            plan.reps,
            label(request.goal),
            plan.sets,
            level_label(request.level).to_lowercase(),
            exercises.len(),
            available
        ),
        exercises,
    }
}

/// Mock workout suggestion engine backed by a static exercise library
#[derive(Debug, Clone, Default)]
pub struct SuggestionService;

impl SuggestionService {
    pub fn new() -> Self {
        Self
    }

    #[tracing::instrument(skip(self))]
    pub fn suggest(&self, request: &SuggestionRequest) -> AppResult<SuggestedWorkout> {
        request.validate()?;

        let suggestion = suggest_workout(request);
        tracing::debug!(
            exercises = suggestion.exercises.len(),
            estimated_minutes = suggestion.estimated_minutes,
            "generated workout suggestion"
        );
        Ok(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(goal: FitnessGoal, level: WorkoutDifficulty, focus: Option<MuscleGroup>, minutes: Option<u32>) -> SuggestionRequest {
        SuggestionRequest {
            goal,
            level,
            focus,
            available_minutes: minutes,
        }
    }

    #[test]
    fn test_suggestion_is_deterministic() {
        let req = request(FitnessGoal::Hypertrophy, Intermediate, Some(Legs), Some(60));
        let first = suggest_workout(&req);
        let second = suggest_workout(&req);

        let names = |s: &SuggestedWorkout| s.exercises.iter().map(|e| e.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.name, "Intermediate hypertrophy: legs");
    }

    #[test]
    fn test_sets_scale_with_level() {
        assert_eq!(prescription(FitnessGoal::Strength, Beginner).sets, 3);
        assert_eq!(prescription(FitnessGoal::Strength, Intermediate).sets, 4);
        assert_eq!(prescription(FitnessGoal::Strength, Advanced).sets, 5);
        assert_eq!(prescription(FitnessGoal::Endurance, Beginner).sets, 2);
    }

    #[test]
    fn test_exercise_count_scales_with_time() {
        let short = suggest_workout(&request(FitnessGoal::Hypertrophy, Intermediate, None, Some(30)));
        let long = suggest_workout(&request(FitnessGoal::Hypertrophy, Intermediate, None, Some(90)));

        assert!(short.exercises.len() < long.exercises.len());
        assert!(short.exercises.len() >= MIN_EXERCISES);
        assert!(long.exercises.len() <= MAX_EXERCISES);
        assert!(long.estimated_minutes <= 90);
    }

    #[test]
    fn test_beginners_skip_advanced_movements() {
        let suggestion = suggest_workout(&request(FitnessGoal::Strength, Beginner, Some(Back), Some(120)));
        let names: Vec<_> = suggestion.exercises.iter().map(|e| e.name.as_str()).collect();

        assert!(!names.contains(&"Pull-up"));
        assert!(!names.contains(&"Conventional Deadlift"));
        assert_eq!(names[0], "Barbell Row");
    }

    #[test]
    fn test_full_body_rotates_groups() {
        let suggestion = suggest_workout(&request(FitnessGoal::Hypertrophy, Advanced, None, Some(180)));
        let names: Vec<_> = suggestion.exercises.iter().take(3).map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["Back Squat", "Barbell Row", "Bench Press"]);
    }

    #[test]
    fn test_mobility_uses_mobility_library() {
        let suggestion = suggest_workout(&request(FitnessGoal::Mobility, Beginner, Some(Chest), Some(30)));

        assert!(suggestion
            .exercises
            .iter()
            .all(|e| MOBILITY_LIBRARY.iter().any(|m| m.name == e.name)));
        assert!(suggestion.exercises.iter().all(|e| e.notes.is_some()));
    }

    #[test]
    fn test_suggested_exercises_pass_validation() {
        let suggestion = suggest_workout(&request(FitnessGoal::WeightLoss, Advanced, Some(Core), None));
        assert!(crate::services::workout_service::validate_exercises(&suggestion.exercises).is_ok());
    }

    #[test]
    fn test_suggest_rejects_out_of_range_minutes() {
        let service = SuggestionService::new();
        let result = service.suggest(&request(FitnessGoal::Strength, Beginner, None, Some(5)));
        assert!(result.is_err());
    }
}
