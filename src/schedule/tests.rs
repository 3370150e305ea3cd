use super::*;
use crate::ilp::{MicroLpSolver, StoppedAtTimeLimit};
use crate::{Status, TopicId};
use chrono::NaiveDate;

/// Date slot in May 2024. The 13th is a Monday in ISO week 20, the 20th a Monday in week 21.
fn slot(day: u32, hour: u32) -> DateSlot {
    DateSlot::new(
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap(),
    )
}

fn tutor(id: u32, is_evaluator: bool, available: &[DateSlot]) -> Tutor {
    Tutor {
        id: TutorId(id),
        name: format!("Tutor {}", id),
        capacity: 4,
        offered_topics: Vec::new(),
        available: available.iter().cloned().collect(),
        is_evaluator,
    }
}

fn group(id: u32, tutor: u32, available: &[DateSlot]) -> AssignedGroup {
    AssignedGroup {
        id: GroupId(id),
        tutor: TutorId(tutor),
        topic: TopicId(id),
        available: available.iter().cloned().collect(),
        date: None,
        reviewer: None,
    }
}

fn run(problem: &ScheduleProblem, settings: &ScheduleSettings) -> Outcome<Presentation> {
    schedule_presentations(problem, settings, &MicroLpSolver, &SolveLimits::default()).unwrap()
}

/// Check all hard constraints of a presentation schedule
fn check_schedule(
    problem: &ScheduleProblem,
    settings: &ScheduleSettings,
    presentations: &[Presentation],
) {
    assert_eq!(presentations.len(), problem.groups.len());
    let find_tutor = |id: TutorId| problem.tutors.iter().find(|t| t.id == id).unwrap();
    let dates: BTreeSet<SlotKey> = problem.dates.iter().map(DateSlot::key).collect();

    for group in problem.groups.iter() {
        let scheduled: Vec<&Presentation> = presentations
            .iter()
            .filter(|p| p.group == group.id)
            .collect();
        assert_eq!(scheduled.len(), 1, "Group {} is not scheduled once", group.id);
        let presentation = scheduled[0];
        let key = presentation.date.key();

        assert_eq!(presentation.tutor, group.tutor);
        assert_ne!(presentation.evaluator, group.tutor);
        let evaluator = find_tutor(presentation.evaluator);
        assert!(evaluator.is_evaluator);
        assert!(dates.contains(&key));
        assert!(group.available.iter().any(|d| d.key() == key));
        assert!(find_tutor(group.tutor).slot_keys().contains(&key));
        assert!(evaluator.slot_keys().contains(&key));
    }

    let used_slots: BTreeSet<SlotKey> = presentations.iter().map(|p| p.date.key()).collect();
    assert_eq!(used_slots.len(), presentations.len(), "Slot used twice");

    let per_week = presentations
        .iter()
        .map(|p| (p.evaluator, p.date.week()))
        .counts();
    for ((evaluator, week), count) in per_week {
        assert!(
            count <= settings.max_groups_per_week as usize,
            "Evaluator {} has {} presentations in week {}",
            evaluator,
            count,
            week
        );
    }
}

fn evaluator_loads(presentations: &[Presentation]) -> Vec<usize> {
    presentations
        .iter()
        .counts_by(|p| p.evaluator)
        .into_values()
        .collect()
}

#[test]
fn test_build_model() {
    let a = slot(13, 9);
    let b = slot(13, 10);
    let c = slot(14, 9);
    // The group's own tutor is an evaluator, too
    let tutors = vec![
        tutor(1, true, &[a, b]),
        tutor(10, true, &[a, b]),
        tutor(11, true, &[a]),
    ];
    let groups = vec![group(0, 1, &[a, b])];
    let dates = vec![a, b, c];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let schedule_model = build_schedule_model(&problem, &ScheduleSettings::default()).unwrap();

    assert_eq!(schedule_model.presentations.len(), 3);
    assert!(schedule_model
        .presentations
        .keys()
        .all(|k| k.evaluator != TutorId(1) && k.slot != c.key()));
    assert_eq!(schedule_model.attendance.len(), 2);
    assert!(schedule_model.unschedulable.is_empty());
    // 3 presentations + 2 date indicators + 2 attendance indicators + 2 load counters
    assert_eq!(schedule_model.model.variables().len(), 9);
    for ((_, day), var) in schedule_model.attendance.iter() {
        assert_eq!(
            schedule_model.model.variable(*var).objective,
            day.week as f64
        );
    }
}

#[test]
fn test_schedule_satisfies_constraints() {
    let week20: Vec<DateSlot> = (13..=17)
        .flat_map(|d| [slot(d, 9), slot(d, 11)])
        .collect();
    let tutors = vec![
        tutor(1, true, &week20),
        tutor(2, true, &week20),
        tutor(3, true, &week20[2..]),
        tutor(4, false, &week20),
    ];
    let groups = vec![
        group(0, 1, &week20),
        group(1, 2, &week20[..6]),
        group(2, 3, &week20[4..]),
        group(3, 4, &week20),
        group(4, 4, &week20[1..3]),
    ];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &week20,
    };
    let settings = ScheduleSettings::default();
    let outcome = run(&problem, &settings);
    assert!(outcome.is_success(), "{:?}", outcome.status());
    check_schedule(&problem, &settings, outcome.items());

    let loads = evaluator_loads(outcome.items());
    let max = loads.iter().max().unwrap();
    // Evaluators without any presentation have load 0
    let min = if loads.len() < 3 { &0 } else { loads.iter().min().unwrap() };
    assert!(max - min <= settings.evaluator_balance as usize);
}

#[test]
fn test_days_are_minimized() {
    let dates = vec![slot(13, 9), slot(13, 10), slot(14, 9), slot(20, 9)];
    let tutors = vec![tutor(1, false, &dates), tutor(10, true, &dates)];
    let groups = vec![group(0, 1, &dates), group(1, 1, &dates)];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let outcome = run(&problem, &ScheduleSettings::default());
    assert!(outcome.is_success());
    check_schedule(&problem, &ScheduleSettings::default(), outcome.items());
    // Both presentations on Monday of week 20
    for presentation in outcome.items() {
        assert_eq!(presentation.date.day(), slot(13, 9).day());
        assert_eq!(presentation.evaluator, TutorId(10));
    }
}

#[test]
fn test_early_weeks_are_preferred() {
    let dates = vec![slot(20, 9), slot(13, 14)];
    let tutors = vec![tutor(1, false, &dates), tutor(10, true, &dates)];
    let groups = vec![group(0, 1, &dates)];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let outcome = run(&problem, &ScheduleSettings::default());
    assert_eq!(outcome.items().len(), 1);
    assert_eq!(outcome.items()[0].date, slot(13, 14));
}

#[test]
fn test_weekly_maximum() {
    let settings = ScheduleSettings {
        max_groups_per_week: 1,
        ..ScheduleSettings::default()
    };
    let week20 = vec![slot(13, 9), slot(13, 10)];
    let tutors = vec![tutor(1, false, &week20), tutor(10, true, &week20)];
    let groups = vec![group(0, 1, &week20), group(1, 1, &week20)];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &week20,
    };
    let outcome = run(&problem, &settings);
    assert_eq!(outcome.failure(), Some(&FailureReason::Infeasible));
    assert!(outcome.items().is_empty());

    // With a slot in the next week, each week gets one presentation
    let dates = vec![slot(13, 9), slot(13, 10), slot(20, 9)];
    let tutors = vec![tutor(1, false, &dates), tutor(10, true, &dates)];
    let groups = vec![group(0, 1, &dates), group(1, 1, &dates)];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let outcome = run(&problem, &settings);
    assert!(outcome.is_success());
    check_schedule(&problem, &settings, outcome.items());
    let weeks: BTreeSet<u32> = outcome.items().iter().map(|p| p.date.week()).collect();
    assert_eq!(weeks, [20, 21].into_iter().collect());
}

#[test]
fn test_evaluator_balance() {
    let dates: Vec<DateSlot> = (9..=12).map(|h| slot(13, h)).collect();
    let tutors = vec![
        tutor(1, false, &dates),
        tutor(10, true, &dates),
        tutor(11, true, &dates),
    ];
    let groups: Vec<AssignedGroup> = (0..4).map(|g| group(g, 1, &dates)).collect();
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let settings = ScheduleSettings {
        evaluator_balance: 0,
        ..ScheduleSettings::default()
    };
    let outcome = run(&problem, &settings);
    assert!(outcome.is_success());
    check_schedule(&problem, &settings, outcome.items());
    assert_eq!(evaluator_loads(outcome.items()), vec![2, 2]);
}

#[test]
fn test_group_without_options() {
    let dates = vec![slot(13, 9), slot(14, 9)];
    // The only evaluator supervises group 1 itself
    let tutors = vec![tutor(1, false, &dates), tutor(10, true, &dates)];
    let groups = vec![group(0, 1, &dates), group(1, 10, &dates)];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let schedule_model = build_schedule_model(&problem, &ScheduleSettings::default()).unwrap();
    assert_eq!(schedule_model.unschedulable, vec![GroupId(1)]);

    let outcome = run(&problem, &ScheduleSettings::default());
    assert_eq!(outcome.failure(), Some(&FailureReason::Infeasible));

    // Availability without overlap has the same effect
    let groups = vec![group(0, 1, &[slot(15, 9)])];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let outcome = run(&problem, &ScheduleSettings::default());
    assert_eq!(outcome.failure(), Some(&FailureReason::Infeasible));
}

#[test]
fn test_unknown_tutor() {
    let dates = vec![slot(13, 9)];
    let tutors = vec![tutor(10, true, &dates)];
    let groups = vec![group(0, 7, &dates)];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    match schedule_presentations(
        &problem,
        &ScheduleSettings::default(),
        &MicroLpSolver,
        &SolveLimits::default(),
    ) {
        Err(Error::UnknownTutor { tutor, group }) => {
            assert_eq!(tutor, TutorId(7));
            assert_eq!(group, GroupId(0));
        }
        other => panic!("Unexpected result {:?}", other),
    }
}

#[test]
fn test_apply_presentation() {
    let mut assigned = group(3, 1, &[slot(13, 9)]);
    let presentation = Presentation {
        group: GroupId(3),
        tutor: TutorId(1),
        evaluator: TutorId(10),
        date: slot(13, 9),
    };
    presentation.apply_to(&mut assigned);
    assert_eq!(assigned.date, Some(slot(13, 9)));
    assert_eq!(assigned.reviewer, Some(TutorId(10)));
}

#[test]
fn test_no_groups() {
    let outcome = run(
        &ScheduleProblem {
            groups: &[],
            tutors: &[],
            dates: &[],
        },
        &ScheduleSettings::default(),
    );
    assert!(outcome.is_success());
    assert!(outcome.items().is_empty());
}

#[test]
fn test_stopped_at_time_limit() {
    let dates = vec![slot(13, 9), slot(13, 10), slot(14, 9), slot(20, 9)];
    let tutors = vec![tutor(1, false, &dates), tutor(10, true, &dates)];
    let groups = vec![group(0, 1, &dates), group(1, 1, &dates)];
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let settings = ScheduleSettings::default();

    // The best solution found until the time limit is decoded like an optimal one
    let outcome = schedule_presentations(
        &problem,
        &settings,
        &StoppedAtTimeLimit { keep_values: true },
        &SolveLimits::default(),
    )
    .unwrap();
    assert!(outcome.is_success());
    check_schedule(&problem, &settings, outcome.items());

    let outcome = schedule_presentations(
        &problem,
        &settings,
        &StoppedAtTimeLimit { keep_values: false },
        &SolveLimits::default(),
    )
    .unwrap();
    assert_eq!(outcome.failure(), Some(&FailureReason::TimeLimit));
    assert!(outcome.items().is_empty());
}

#[test]
fn test_time_limit_bounds_large_schedules() {
    // 10 groups, 5 evaluators (who also tutor), 24 slots: far too large for microlp to prove
    // optimality quickly
    let dates: Vec<DateSlot> = (13..=17)
        .chain(20..=20)
        .flat_map(|d| (9..13).map(move |h| slot(d, h)))
        .collect();
    assert_eq!(dates.len(), 24);
    let tutors: Vec<Tutor> = (1..=5).map(|t| tutor(t, true, &dates)).collect();
    let groups: Vec<AssignedGroup> = (0..10).map(|g| group(g, g % 5 + 1, &dates)).collect();
    let problem = ScheduleProblem {
        groups: &groups,
        tutors: &tutors,
        dates: &dates,
    };
    let settings = ScheduleSettings::default();
    let limits = SolveLimits {
        time_limit: Some(1.0),
        ..SolveLimits::default()
    };

    let start = std::time::Instant::now();
    let outcome = schedule_presentations(&problem, &settings, &MicroLpSolver, &limits).unwrap();
    assert!(start.elapsed() < std::time::Duration::from_secs(10));
    match outcome.status() {
        Status::Success => check_schedule(&problem, &settings, outcome.items()),
        Status::Failed(reason) => assert_eq!(reason, &FailureReason::TimeLimit),
    }
}
