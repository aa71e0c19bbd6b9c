//! Dashboard cards derived from the user's age and region

use rand::Rng;
use serde::Serialize;
use utoipa::ToSchema;

use voice_companion_data::models::User;

pub const DEFAULT_AGE: i32 = 25;
pub const DEFAULT_REGION: &str = "北京";

/// Age bucket used by every card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeGroup {
    Young,
    Middle,
    Senior,
}

impl AgeGroup {
    pub fn of(age: i32) -> Self {
        if age < 30 {
            AgeGroup::Young
        } else if age < 50 {
            AgeGroup::Middle
        } else {
            AgeGroup::Senior
        }
    }
}

/// Stored age, or [`DEFAULT_AGE`] when unknown
pub fn effective_age(user: &User) -> i32 {
    user.age.filter(|age| *age > 0).unwrap_or(DEFAULT_AGE)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StepsCard {
    pub steps: i64,
    pub activity: String,
    pub goal: i64,
    pub progress: f64,
    pub calories: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeatherCard {
    pub temp: String,
    pub desc: String,
    pub humidity: String,
    pub wind: String,
    pub air_quality: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SleepCard {
    pub hours: f64,
    pub quality: String,
    pub deep_sleep: f64,
    pub rem_sleep: f64,
    pub goal: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BodyMetricsCard {
    pub weight: i64,
    pub height: i64,
    pub bmi: f64,
    pub bmi_status: String,
    pub goal_weight: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeCard {
    pub suggestion: String,
    pub daily_calories: i64,
    pub protein_goal: String,
    pub carbs_goal: String,
    pub fat_goal: String,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn steps_card(age: i32, rng: &mut impl Rng) -> StepsCard {
    let (steps, activity): (i64, &str) = match AgeGroup::of(age) {
        AgeGroup::Young => (rng.gen_range(8000..=12000), "活跃"),
        AgeGroup::Middle => (rng.gen_range(6000..=10000), "中等"),
        AgeGroup::Senior => (rng.gen_range(4000..=8000), "轻度"),
    };
    StepsCard {
        steps,
        activity: activity.to_string(),
        goal: 10000,
        progress: steps as f64 / 10000.0 * 100.0,
        calories: steps as f64 * 0.04,
    }
}

pub fn weather_card(region: Option<&str>) -> WeatherCard {
    let region = region.filter(|r| !r.trim().is_empty()).unwrap_or(DEFAULT_REGION);
    WeatherCard {
        temp: "25°C".to_string(),
        desc: "晴".to_string(),
        humidity: "65%".to_string(),
        wind: "微风".to_string(),
        air_quality: "良好".to_string(),
        region: region.to_string(),
    }
}

pub fn sleep_card(age: i32, rng: &mut impl Rng) -> SleepCard {
    let (hours, quality): (f64, &str) = match AgeGroup::of(age) {
        AgeGroup::Young => (rng.gen_range(7.0..=9.0), "良好"),
        AgeGroup::Middle => (rng.gen_range(6.5..=8.5), "中等"),
        AgeGroup::Senior => (rng.gen_range(6.0..=8.0), "一般"),
    };
    SleepCard {
        hours: round1(hours),
        quality: quality.to_string(),
        deep_sleep: round1(hours * 0.25),
        rem_sleep: round1(hours * 0.2),
        goal: 8.0,
    }
}

pub fn bmi_status(bmi: f64) -> &'static str {
    if (18.5..=24.0).contains(&bmi) {
        "正常"
    } else if bmi > 24.0 {
        "偏重"
    } else {
        "偏轻"
    }
}

pub fn body_metrics_card(age: i32, rng: &mut impl Rng) -> BodyMetricsCard {
    let (weight, height): (i64, i64) = match AgeGroup::of(age) {
        AgeGroup::Young => (rng.gen_range(55..=75), rng.gen_range(160..=180)),
        AgeGroup::Middle => (rng.gen_range(60..=80), rng.gen_range(160..=180)),
        AgeGroup::Senior => (rng.gen_range(55..=75), rng.gen_range(155..=175)),
    };
    let meters = height as f64 / 100.0;
    let bmi = round1(weight as f64 / (meters * meters));
    BodyMetricsCard {
        weight,
        height,
        bmi,
        bmi_status: bmi_status(bmi).to_string(),
        goal_weight: weight,
    }
}

fn recipe_suggestions(group: AgeGroup) -> &'static [&'static str] {
    match group {
        AgeGroup::Young => &["多吃蛋白质丰富的食物", "适量补充维生素C", "保持水分摄入"],
        AgeGroup::Middle => &["控制热量摄入", "多吃蔬菜水果", "适量运动配合饮食"],
        AgeGroup::Senior => &["清淡饮食为主", "多吃高纤维食物", "注意钙质补充"],
    }
}

pub fn recipe_card(age: i32, rng: &mut impl Rng) -> RecipeCard {
    let suggestions = recipe_suggestions(AgeGroup::of(age));
    let suggestion = suggestions[rng.gen_range(0..suggestions.len())];
    RecipeCard {
        suggestion: suggestion.to_string(),
        daily_calories: 2000,
        protein_goal: "80g".to_string(),
        carbs_goal: "250g".to_string(),
        fat_goal: "65g".to_string(),
    }
}

/// Three-point advice for the user's age bucket
pub fn personalized_advice(age: i32) -> String {
    match AgeGroup::of(age) {
        AgeGroup::Young => format!("作为{}岁的年轻人，建议您：\n1. 保持规律作息\n2. 多进行户外运动\n3. 注意营养均衡", age),
        AgeGroup::Middle => format!("作为{}岁的中年人，建议您：\n1. 定期体检\n2. 适量运动\n3. 控制饮食", age),
        AgeGroup::Senior => format!("作为{}岁的年长者，建议您：\n1. 保持适度活动\n2. 定期健康检查\n3. 注意保暖", age),
    }
}
