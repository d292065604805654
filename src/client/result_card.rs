use crate::models::AnalysisResult;

struct ProgressBar {
    bar: String,
    percentage: i32,
}

fn create_progress_bar(percentage: f64) -> ProgressBar {
    let percentage = percentage.clamp(0.0, 100.0).round() as i32;
    let filled = (percentage / 10) as usize;
    let empty = 10 - filled;

    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(empty));

    ProgressBar { bar, percentage }
}

/// Plain-text summary of an analysis, one bar per macronutrient.
pub fn format_result_card(result: &AnalysisResult) -> String {
    let breakdown = result.nutrients.breakdown();
    let protein = create_progress_bar(breakdown.protein_pct);
    let carbs = create_progress_bar(breakdown.carbs_pct);
    let fat = create_progress_bar(breakdown.fat_pct);

    let portion = if result.portion_size.trim().is_empty() {
        String::new()
    } else {
        format!("Portion size: {}\n", result.portion_size.trim())
    };

    format!(
        "🍽️ {}\n\
         {}\
         🔥 {:.0} kcal\n\n\
         Protein {:>5.1}g {} {}%\n\
         Carbs   {:>5.1}g {} {}%\n\
         Fat     {:>5.1}g {} {}%",
        result.food_name,
        portion,
        result.calories,
        result.nutrients.protein,
        protein.bar,
        protein.percentage,
        result.nutrients.carbs,
        carbs.bar,
        carbs.percentage,
        result.nutrients.fat,
        fat.bar,
        fat.percentage,
    )
}
