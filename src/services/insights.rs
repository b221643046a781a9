//! Natural-language questions about the weather in a user's saved cities.
//!
//! Weather for every saved city is condensed into one paragraph, sent to the
//! generative API together with the question, and replaced by a local
//! min/max/average summary whenever the API is unavailable.

use uuid::Uuid;

use crate::{
    assistant::InsightService,
    error::AppError,
    models::{AnswerSource, AskResponse, WeatherReport},
    repository::Repository,
    weather::WeatherService,
};

const MAX_QUESTION_CHARS: usize = 500;
const MAX_CONTEXT_CHARS: usize = 1500;
const LINE_SEPARATOR: &str = "; ";

/// One line of prompt context:
/// `"Paris, FR: 18.4°C, light rain, humidity 64%, wind 4.1 m/s"`.
pub fn weather_line(report: &WeatherReport) -> String {
    let place = match &report.country {
        Some(code) => format!("{}, {}", report.city, code),
        None => report.city.clone(),
    };
    format!(
        "{place}: {:.1}°C, {}, humidity {}%, wind {:.1} m/s",
        report.temperature, report.description, report.humidity, report.wind_speed
    )
}

/// Joins lines into a single paragraph, dropping whole lines past the cap.
/// The cap counts characters, not bytes.
pub fn build_context(lines: &[String]) -> String {
    let mut paragraph = String::new();
    let mut chars = 0;
    for line in lines {
        let extra = if paragraph.is_empty() {
            line.chars().count()
        } else {
            LINE_SEPARATOR.chars().count() + line.chars().count()
        };
        if chars + extra > MAX_CONTEXT_CHARS {
            break;
        }
        if !paragraph.is_empty() {
            paragraph.push_str(LINE_SEPARATOR);
        }
        paragraph.push_str(line);
        chars += extra;
    }
    paragraph
}

pub fn build_prompt(context: &str, question: &str) -> String {
    let context = if context.is_empty() {
        "No weather data is available for the user's saved cities."
    } else {
        context
    };
    format!(
        "You are a concise weather assistant. Current conditions in the user's saved cities: \
         {context}\n\nAnswer the user's question using only these conditions, in at most three \
         sentences.\n\nQuestion: {question}"
    )
}

/// Parses `(place, temperature)` out of a context line. The temperature is the
/// number immediately before `°C`.
pub fn parse_temperature(line: &str) -> Option<(String, f64)> {
    let (place, rest) = line.split_once(": ")?;
    let (number, _) = rest.split_once("°C")?;
    let temperature = number.trim().parse::<f64>().ok()?;
    Some((place.to_string(), temperature))
}

/// Local answer when the generative API cannot be used: min, max and average
/// over the temperatures that parse out of the context lines.
pub fn heuristic_answer(lines: &[String]) -> String {
    let readings: Vec<(String, f64)> = lines.iter().filter_map(|l| parse_temperature(l)).collect();

    let Some(first) = readings.first() else {
        return "I don't have any weather data for your saved cities yet. \
                Add a city to get started."
            .to_string();
    };

    if readings.len() == 1 {
        return format!("It is currently {:.1}°C in {}.", first.1, first.0);
    }

    let warmest = readings
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or(first);
    let coldest = readings
        .iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or(first);
    let average = readings.iter().map(|(_, t)| t).sum::<f64>() / readings.len() as f64;

    format!(
        "Across your {} saved cities, temperatures range from {:.1}°C in {} to {:.1}°C in {}, \
         averaging {:.1}°C. {} is the warmest right now and {} is the coldest.",
        readings.len(),
        coldest.1,
        coldest.0,
        warmest.1,
        warmest.0,
        average,
        warmest.0,
        coldest.0
    )
}

/// ask
///
/// Answers a question about the owner's saved cities. Cities whose weather
/// cannot be fetched are skipped; a generator failure falls back to the
/// heuristic rather than failing the request.
pub async fn ask(
    repo: &dyn Repository,
    weather: &dyn WeatherService,
    insight: &dyn InsightService,
    owner: Uuid,
    question: &str,
) -> Result<AskResponse, AppError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::bad_request("Question is required"));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(AppError::bad_request(format!(
            "Question must be at most {MAX_QUESTION_CHARS} characters"
        )));
    }

    let cities = repo.list_cities(owner).await?;
    let mut lines = Vec::with_capacity(cities.len());
    let mut names = Vec::with_capacity(cities.len());
    for city in &cities {
        match weather
            .current_weather(&city.name, city.country.as_deref())
            .await
        {
            Ok(report) => {
                lines.push(weather_line(&report));
                names.push(city.name.clone());
            }
            Err(e) => {
                tracing::warn!(city_id = %city.id, error = %e, "skipping city without weather");
            }
        }
    }

    let context = build_context(&lines);
    let prompt = build_prompt(&context, question);

    let (answer, source) = match insight.generate(&prompt).await {
        Ok(answer) => (answer, AnswerSource::Ai),
        Err(e) => {
            tracing::warn!(error = %e, "generative API unavailable; using heuristic answer");
            (heuristic_answer(&lines), AnswerSource::Heuristic)
        }
    };

    Ok(AskResponse {
        answer,
        source,
        cities: names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::MockInsightService;
    use crate::models::NewCity;
    use crate::repository::InMemoryRepository;
    use crate::weather::MockWeatherService;

    fn report(city: &str, country: &str, temperature: f64) -> WeatherReport {
        WeatherReport {
            city: city.to_string(),
            country: Some(country.to_string()),
            temperature,
            humidity: 40,
            wind_speed: 2.0,
            description: "clear sky".to_string(),
            ..WeatherReport::default()
        }
    }

    async fn save(repo: &InMemoryRepository, owner: Uuid, name: &str, country: &str) {
        repo.create_city(NewCity {
            user_id: owner,
            name: name.to_string(),
            normalized_name: name.to_lowercase(),
            country: Some(country.to_string()),
        })
        .await
        .unwrap();
    }

    #[test]
    fn line_format_round_trips_through_parser() {
        let line = weather_line(&report("Paris", "FR", 18.44));
        assert_eq!(line, "Paris, FR: 18.4°C, clear sky, humidity 40%, wind 2.0 m/s");
        assert_eq!(parse_temperature(&line), Some(("Paris, FR".to_string(), 18.4)));
    }

    #[test]
    fn negative_temperatures_parse() {
        let line = weather_line(&report("Yakutsk", "RU", -31.0));
        assert_eq!(parse_temperature(&line).unwrap().1, -31.0);
    }

    #[test]
    fn context_is_one_capped_paragraph() {
        let lines: Vec<String> = (0..200)
            .map(|i| weather_line(&report(&format!("City{i}"), "XX", i as f64)))
            .collect();
        let context = build_context(&lines);
        assert!(context.chars().count() <= MAX_CONTEXT_CHARS);
        assert!(!context.contains('\n'));
        assert!(context.starts_with("City0, XX"));
    }

    #[test]
    fn context_cap_counts_characters() {
        // 100 chars each, but 200 bytes.
        let lines: Vec<String> = (0..20).map(|_| "ü°".repeat(50)).collect();
        let context = build_context(&lines);
        // 14 lines plus 13 separators fit: 14 * 100 + 13 * 2 = 1426.
        assert_eq!(context.chars().count(), 1426);
        assert!(context.len() > MAX_CONTEXT_CHARS);
    }

    #[test]
    fn heuristic_summarizes_extremes() {
        let lines = vec![
            weather_line(&report("Oslo", "NO", -2.0)),
            weather_line(&report("Lisbon", "PT", 21.0)),
            weather_line(&report("Paris", "FR", 11.0)),
        ];
        let answer = heuristic_answer(&lines);
        assert!(answer.contains("-2.0°C in Oslo, NO"));
        assert!(answer.contains("21.0°C in Lisbon, PT"));
        assert!(answer.contains("averaging 10.0°C"));
    }

    #[test]
    fn heuristic_without_data() {
        assert!(heuristic_answer(&[]).contains("don't have any weather data"));
        assert!(heuristic_answer(&["garbage".to_string()]).contains("don't have any weather data"));
    }

    #[tokio::test]
    async fn ai_answer_uses_weather_context() {
        let repo = InMemoryRepository::new();
        let owner = Uuid::new_v4();
        save(&repo, owner, "Lisbon", "PT").await;
        let weather = MockWeatherService::new().with_report("Lisbon", "PT", 22.0, "sunny");
        let insight = MockInsightService::answering("Lisbon is lovely.");

        let res = ask(&repo, &weather, &insight, owner, "Where should I go?")
            .await
            .unwrap();
        assert_eq!(res.source, AnswerSource::Ai);
        assert_eq!(res.answer, "Lisbon is lovely.");
        assert_eq!(res.cities, vec!["Lisbon".to_string()]);

        let prompt = insight.last_prompt().unwrap();
        assert!(prompt.contains("Lisbon, PT: 22.0°C, sunny"));
        assert!(prompt.contains("Question: Where should I go?"));
    }

    #[tokio::test]
    async fn generator_failure_falls_back() {
        let repo = InMemoryRepository::new();
        let owner = Uuid::new_v4();
        save(&repo, owner, "Lisbon", "PT").await;
        save(&repo, owner, "Atlantis", "XX").await;
        let weather = MockWeatherService::new().with_report("Lisbon", "PT", 22.0, "sunny");

        let res = ask(&repo, &weather, &MockInsightService::failing(), owner, "Warm?")
            .await
            .unwrap();
        assert_eq!(res.source, AnswerSource::Heuristic);
        assert_eq!(res.cities, vec!["Lisbon".to_string()]);
        assert!(res.answer.contains("22.0°C in Lisbon, PT"));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = ask(
            &repo,
            &MockWeatherService::new(),
            &MockInsightService::failing(),
            Uuid::new_v4(),
            "   ",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    async fn ask_with(question: &str) -> Result<AskResponse, AppError> {
        ask(
            &InMemoryRepository::new(),
            &MockWeatherService::new(),
            &MockInsightService::failing(),
            Uuid::new_v4(),
            question,
        )
        .await
    }

    #[tokio::test]
    async fn question_length_limit() {
        let at_limit = "a".repeat(MAX_QUESTION_CHARS);
        let res = ask_with(&at_limit).await.unwrap();
        assert_eq!(res.source, AnswerSource::Heuristic);

        let over = "a".repeat(MAX_QUESTION_CHARS + 1);
        let err = ask_with(&over).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn question_limit_counts_characters() {
        // 1000 bytes but 500 characters.
        let at_limit = "é".repeat(MAX_QUESTION_CHARS);
        assert!(ask_with(&at_limit).await.is_ok());

        let over = "é".repeat(MAX_QUESTION_CHARS + 1);
        let err = ask_with(&over).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn surrounding_whitespace_does_not_count() {
        let padded = format!("  {}  ", "a".repeat(MAX_QUESTION_CHARS));
        assert!(ask_with(&padded).await.is_ok());
    }
}
