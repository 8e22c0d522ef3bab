use std::collections::BTreeSet;

use proptest::prelude::*;

use catchlog::{
    builder::EntryBuilder,
    contest::{ContestEntry, LineSetup},
    engine::{
        stats::summarize,
        view::{ContestFilter, view},
    },
    types::{CatchType, EntryId, WaterCharacteristic},
    weather::{MIN_TEMPERATURE, estimate},
};

const LOCATIONS: &[&str] = &["Messancy", "Arlon", "Virton", ""];
const RANKINGS: &[&str] = &["Gagné", "gagnant secteur", "3e", "", "Perdu", "GAGNÉ"];

#[derive(Debug, Clone)]
struct Row {
    location: u8,
    ranking: u8,
    weight: u32,
    catches: Vec<u8>,
}

fn row_strategy() -> impl Strategy<Value = Row> {
    (
        0u8..4,
        0u8..6,
        0u32..20_000,
        prop::collection::vec(0u8..6, 0..4),
    )
        .prop_map(|(location, ranking, weight, catches)| Row {
            location,
            ranking,
            weight,
            catches,
        })
}

fn entry_from(id: EntryId, row: &Row) -> ContestEntry {
    ContestEntry {
        id,
        date: format!("2024-01-{:02}", (id % 28) + 1),
        location: LOCATIONS[usize::from(row.location)].to_string(),
        total_weight: f64::from(row.weight),
        ranking: RANKINGS[usize::from(row.ranking)].to_string(),
        water_characteristic: Some(WaterCharacteristic::Claire),
        temperature: None,
        weather_conditions: vec![],
        lines: vec![LineSetup {
            id: "l".to_string(),
            float_size: None,
            main_line: None,
            length_meters: None,
            hook: String::new(),
            rig_notes: String::new(),
            remarks: String::new(),
        }],
        groundbait_recipe: String::new(),
        feeding_strategy: String::new(),
        hook_baits: vec![],
        catches: row
            .catches
            .iter()
            .map(|c| CatchType::ALL[usize::from(*c)])
            .collect(),
        created_at: None,
    }
}

fn entries_from(rows: &[Row]) -> Vec<ContestEntry> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| entry_from(i as EntryId + 1, r))
        .collect()
}

fn ids(items: &[&ContestEntry]) -> BTreeSet<EntryId> {
    items.iter().map(|e| e.id).collect()
}

proptest! {
    #[test]
    fn average_and_win_rate_follow_their_formulas(rows in prop::collection::vec(row_strategy(), 0..60)) {
        let entries = entries_from(&rows);
        let stats = summarize(&entries);
        if entries.is_empty() {
            prop_assert!(stats.is_none());
            return Ok(());
        }
        let stats = stats.expect("stats");

        let sum: f64 = entries.iter().map(|e| e.total_weight).sum();
        let expected_avg = sum / entries.len() as f64;
        prop_assert!((stats.average_weight - expected_avg).abs() < 1e-9);

        let wins = entries.iter().filter(|e| e.ranking.to_lowercase().contains("gagn")).count();
        let expected_rate = (100.0 * wins as f64 / entries.len() as f64).round() as u8;
        prop_assert!(stats.win_rate <= 100);
        prop_assert_eq!(stats.win_rate, expected_rate);
    }

    #[test]
    fn filtering_is_conjunctive(rows in prop::collection::vec(row_strategy(), 0..60), loc in 0u8..4, catch in 0u8..6) {
        let entries = entries_from(&rows);
        let location = Some(LOCATIONS[usize::from(loc)].to_string());
        let catch = Some(CatchType::ALL[usize::from(catch)]);
        let all = usize::MAX / 2;

        let both = view(&entries, &ContestFilter { location: location.clone(), catch }, 1, all);
        let by_loc = view(&entries, &ContestFilter { location, catch: None }, 1, all);
        let by_catch = view(&entries, &ContestFilter { location: None, catch }, 1, all);

        let intersection: BTreeSet<EntryId> = ids(&by_loc.items)
            .intersection(&ids(&by_catch.items))
            .copied()
            .collect();
        prop_assert!(ids(&both.items).is_subset(&intersection));
    }

    #[test]
    fn pages_reconstruct_the_filtered_list(rows in prop::collection::vec(row_strategy(), 0..80), page_size in 1usize..10, catch in prop::option::of(0u8..6)) {
        let entries = entries_from(&rows);
        let filter = ContestFilter { location: None, catch: catch.map(|c| CatchType::ALL[usize::from(c)]) };

        let expected: Vec<EntryId> = entries.iter().filter(|e| filter.matches(e)).map(|e| e.id).collect();
        let first = view(&entries, &filter, 1, page_size);
        prop_assert!(first.total_pages >= 1);

        let mut rebuilt = Vec::new();
        for page in 1..=first.total_pages {
            let pv = view(&entries, &filter, page, page_size);
            prop_assert!(pv.items.len() <= page_size);
            rebuilt.extend(pv.items.iter().map(|e| e.id));
        }
        prop_assert_eq!(rebuilt, expected);
        prop_assert!(view(&entries, &filter, first.total_pages + 1, page_size).items.is_empty());
    }

    #[test]
    fn estimate_is_deterministic_and_bounded(location in "\\PC{0,24}", date in "[0-9]{4}-[0-9]{2}-[0-9]{2}") {
        let a = estimate(&location, &date);
        let b = estimate(&location, &date);
        prop_assert_eq!(&a, &b);
        prop_assert!(a.temperature >= MIN_TEMPERATURE);
    }

    #[test]
    fn remove_line_never_empties_the_draft(ops in prop::collection::vec((any::<bool>(), 0usize..8), 1..40)) {
        let mut builder = EntryBuilder::new();
        for (add, pick) in ops {
            if add {
                builder.add_line();
            } else {
                let lines = &builder.draft().lines;
                let id = lines[pick % lines.len()].id.clone();
                builder.remove_line(&id);
            }
            prop_assert!(!builder.draft().lines.is_empty());
        }
        let ids: BTreeSet<&str> = builder.draft().lines.iter().map(|l| l.id.as_str()).collect();
        prop_assert_eq!(ids.len(), builder.draft().lines.len());
    }
}
