//! SARS-CoV-2 scenario driver over a county graph.
//!
//! Builds a meta-population graph from input data (or loads a previously
//! written one), attaches the NPI timeline of the simulated period, and runs
//! a Monte Carlo parameter study. Results are written as per-run CSV time
//! series plus sampled parameters, and an ensemble mean per node.
//!
//! ```text
//! scenario <data_dir> <save_dir> <result_dir> [flags]   build, save and run
//! scenario <load_dir> <result_dir> [flags]              load and run
//! ```

use clap::Parser;
use epimet::age::{AgeGroup, NUM_AGE_GROUPS};
use epimet::contact::{
    ContactMatrix, ContactMatrixGroup, DampingLevel, DampingSampling, DampingType,
};
use epimet::date::Date;
use epimet::graph::{Graph, MobilityParameters};
use epimet::io::{
    read_graph, write_graph, ContactLocation, DataProvider, DirectoryResultSink,
    FileDataProvider, MatrixVariant, MobilityKind, ResultSink,
};
use epimet::prelude::*;
use epimet::secir::{draw_sample_graph, InfectionState, Model, ParameterKey};
use epimet::study::NodeResult;
use epimet::uncertain::assign_uniform_distribution;
use epimet::{set_log_level, LevelFilter};
use nalgebra::DVector;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

/// Types of NPI, used as damping types.
enum Intervention {
    Home,
    SchoolClosure,
    HomeOffice,
    GatheringBanFacilitiesClosure,
    PhysicalDistanceAndMasks,
    SeniorAwareness,
}

/// Levels of NPI, used as damping levels. Dampings on different levels
/// stack.
enum InterventionLevel {
    Main,
    PhysicalDistanceAndMasks,
    SeniorAwareness,
    Holidays,
}

impl Intervention {
    fn damping_type(self) -> DampingType {
        DampingType(self as i32)
    }
}

impl InterventionLevel {
    fn damping_level(self) -> DampingLevel {
        DampingLevel(self as i32)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "scenario",
    about = "Run a SARS-CoV-2 ensemble scenario on a county graph"
)]
struct Args {
    /// `<data_dir> <save_dir> <result_dir>` to build from data, or
    /// `<load_dir> <result_dir>` to load a saved graph.
    #[arg(required = true, num_args = 2..=3)]
    dirs: Vec<PathBuf>,

    /// Write the results of every single run, not only the ensemble mean.
    #[arg(long)]
    save_single_runs: bool,

    /// Scenario variant: more transmissible virus variant.
    #[arg(long)]
    high: bool,

    /// Scenario variant: autumn interventions start a month later.
    #[arg(long)]
    late: bool,

    /// Scenario variant: physical distancing and masks stay in effect.
    #[arg(long)]
    masks: bool,

    /// Scenario variant: triggered NPIs stay active for 90 days instead of
    /// 14.
    #[arg(long = "long")]
    long_time: bool,

    /// Scenario variant: dynamic NPIs keep triggering for the whole
    /// simulated period.
    #[arg(long)]
    future: bool,

    /// First simulated day.
    #[arg(long, default_value = "2020.12.12")]
    start_date: String,

    /// Number of simulated days.
    #[arg(long, default_value = "30")]
    num_days: u32,

    /// Number of Monte Carlo runs.
    #[arg(long, default_value = "10")]
    num_runs: usize,

    /// Master seed of the study.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error, off).
    #[arg(short, long)]
    log_level: Option<String>,
}

fn all_groups() -> DVector<f64> {
    DVector::from_element(NUM_AGE_GROUPS, 1.0)
}

/// Senior-focused interventions affect 80+ fully and 60-79 partially.
fn senior_groups() -> DVector<f64> {
    let mut weights = DVector::zeros(NUM_AGE_GROUPS);
    weights[4] = 0.5;
    weights[5] = 1.0;
    weights
}

fn uncertain(min: f64, max: f64) -> UncertainValue {
    let mut value = UncertainValue::new(0.0);
    assign_uniform_distribution(&mut value, min, max);
    value
}

fn damping(
    value: UncertainValue,
    level: InterventionLevel,
    damping_type: Intervention,
    t: SimulationTime,
    locations: &[ContactLocation],
    weights: DVector<f64>,
) -> DampingSampling {
    DampingSampling {
        value,
        level: level.damping_level(),
        damping_type: damping_type.damping_type(),
        time: t,
        matrix_indices: locations.iter().map(|l| l.index()).collect(),
        group_weights: weights,
    }
}

fn contacts_at_home(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::Main,
        Intervention::Home,
        t,
        &[ContactLocation::Home],
        all_groups(),
    )
}

fn school_closure(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::Main,
        Intervention::SchoolClosure,
        t,
        &[ContactLocation::School],
        all_groups(),
    )
}

fn home_office(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::Main,
        Intervention::HomeOffice,
        t,
        &[ContactLocation::Work],
        all_groups(),
    )
}

fn social_events(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::Main,
        Intervention::GatheringBanFacilitiesClosure,
        t,
        &[ContactLocation::Other],
        all_groups(),
    )
}

fn social_events_work(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::Main,
        Intervention::GatheringBanFacilitiesClosure,
        t,
        &[ContactLocation::Work],
        all_groups(),
    )
}

fn physical_distancing_home_school(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::PhysicalDistanceAndMasks,
        Intervention::PhysicalDistanceAndMasks,
        t,
        &[ContactLocation::Home, ContactLocation::School],
        all_groups(),
    )
}

fn physical_distancing_work_other(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::PhysicalDistanceAndMasks,
        Intervention::PhysicalDistanceAndMasks,
        t,
        &[ContactLocation::Work, ContactLocation::Other],
        all_groups(),
    )
}

fn senior_awareness(t: SimulationTime, min: f64, max: f64) -> DampingSampling {
    damping(
        uncertain(min, max),
        InterventionLevel::SeniorAwareness,
        Intervention::SeniorAwareness,
        t,
        &[ContactLocation::Home, ContactLocation::Other],
        senior_groups(),
    )
}

/// Epidemiological parameters of the wild type virus; the `high` variant
/// scales transmission like the more contagious lineages.
fn set_covid_parameters(params: &mut epimet::secir::Parameters, high: bool) {
    let incubation_time = 5.2;
    let serial_interval_min = 0.5 * 2.67 + 0.5 * 5.2;
    let serial_interval_max = 0.5 * 4.00 + 0.5 * 5.2;
    let time_infected_symptoms_min = [5.6255, 5.6255, 5.6646, 5.5631, 5.501, 5.465];
    let time_infected_symptoms_max = [8.427, 8.427, 8.4684, 8.3139, 8.169, 8.085];
    let time_infected_severe_min = [3.925, 3.925, 4.85, 6.4, 7.2, 9.0];
    let time_infected_severe_max = [6.075, 6.075, 7.0, 8.7, 9.8, 13.0];
    let time_infected_critical_min = [4.95, 4.95, 4.86, 14.14, 14.4, 10.0];
    let time_infected_critical_max = [8.95, 8.95, 8.86, 20.58, 19.8, 13.2];

    let variant_factor = if high { 1.4 } else { 1.0 };
    let transmission_min: Vec<f64> = [0.02, 0.05, 0.05, 0.05, 0.08, 0.15]
        .iter()
        .map(|v| v * variant_factor)
        .collect();
    let transmission_max: Vec<f64> = [0.04, 0.07, 0.07, 0.07, 0.10, 0.20]
        .iter()
        .map(|v| v * variant_factor)
        .collect();
    let recovered_per_infected_no_symptoms_min = [0.2, 0.2, 0.15, 0.15, 0.15, 0.15];
    let recovered_per_infected_no_symptoms_max = [0.3, 0.3, 0.25, 0.25, 0.25, 0.25];
    let severe_per_infected_symptoms_min = [0.006, 0.006, 0.015, 0.049, 0.15, 0.20];
    let severe_per_infected_symptoms_max = [0.009, 0.009, 0.023, 0.074, 0.18, 0.25];
    let critical_per_severe_min = [0.05, 0.05, 0.05, 0.10, 0.25, 0.35];
    let critical_per_severe_max = [0.10, 0.10, 0.10, 0.20, 0.35, 0.45];
    let deaths_per_critical_min = [0.00, 0.00, 0.10, 0.10, 0.30, 0.5];
    let deaths_per_critical_max = [0.10, 0.10, 0.18, 0.18, 0.50, 0.7];

    for age in AgeGroup::all() {
        let i = age.index();
        let mut set = |key: ParameterKey, min: f64, max: f64| {
            assign_uniform_distribution(params.get_mut(key, age), min, max);
        };
        set(ParameterKey::IncubationTime, incubation_time, incubation_time);
        set(
            ParameterKey::SerialInterval,
            serial_interval_min,
            serial_interval_max,
        );
        set(
            ParameterKey::TimeInfectedSymptoms,
            time_infected_symptoms_min[i],
            time_infected_symptoms_max[i],
        );
        set(
            ParameterKey::TimeInfectedSevere,
            time_infected_severe_min[i],
            time_infected_severe_max[i],
        );
        set(
            ParameterKey::TimeInfectedCritical,
            time_infected_critical_min[i],
            time_infected_critical_max[i],
        );
        set(
            ParameterKey::TransmissionProbabilityOnContact,
            transmission_min[i],
            transmission_max[i],
        );
        set(ParameterKey::RelativeTransmissionNoSymptoms, 1.0, 1.0);
        set(ParameterKey::RiskOfInfectionFromSymptomatic, 0.1, 0.3);
        set(ParameterKey::MaxRiskOfInfectionFromSymptomatic, 0.3, 0.5);
        set(
            ParameterKey::RecoveredPerInfectedNoSymptoms,
            recovered_per_infected_no_symptoms_min[i],
            recovered_per_infected_no_symptoms_max[i],
        );
        set(
            ParameterKey::SeverePerInfectedSymptoms,
            severe_per_infected_symptoms_min[i],
            severe_per_infected_symptoms_max[i],
        );
        set(
            ParameterKey::CriticalPerSevere,
            critical_per_severe_min[i],
            critical_per_severe_max[i],
        );
        set(
            ParameterKey::DeathsPerCritical,
            deaths_per_critical_min[i],
            deaths_per_critical_max[i],
        );
    }
    assign_uniform_distribution(params.get_scalar_mut(ParameterKey::Seasonality), 0.1, 0.3);
}

fn set_contact_matrices(
    provider: &impl DataProvider,
    params: &mut epimet::secir::Parameters,
) -> Result<(), EpiError> {
    let mut matrices = Vec::with_capacity(ContactLocation::COUNT);
    for location in ContactLocation::ALL {
        let baseline = provider.read_contact_matrix(location, MatrixVariant::Baseline)?;
        let minimum = provider.read_contact_matrix(location, MatrixVariant::Minimum)?;
        let mut matrix = ContactMatrix::new(baseline);
        matrix.set_minimum(minimum)?;
        matrices.push(matrix);
    }
    params.contact_patterns_mut().contact_matrices = ContactMatrixGroup::from_matrices(matrices);
    Ok(())
}

/// The NPI timeline of 2020 relative to the start date, plus the dynamic
/// NPIs triggered by local incidence.
fn set_npis(
    start_date: Date,
    end_date: Date,
    params: &mut epimet::secir::Parameters,
    args: &Args,
) -> Result<(), EpiError> {
    let day_of = |date: Date| SimulationTime(f64::from(date.days_since(&start_date)));
    let mut dampings = Vec::new();

    // Spring 2020 lockdown.
    let start_spring = Date::new(2020, 3, 18)?;
    if start_spring < end_date {
        let t = day_of(start_spring);
        dampings.push(contacts_at_home(t, 0.6, 0.8));
        dampings.push(school_closure(t, 1.0, 1.0));
        dampings.push(home_office(t, 0.2, 0.3));
        dampings.push(social_events(t, 0.6, 0.8));
        dampings.push(social_events_work(t, 0.1, 0.2));
        dampings.push(physical_distancing_home_school(t, 0.4, 0.6));
        dampings.push(physical_distancing_work_other(t, 0.4, 0.6));
        dampings.push(senior_awareness(t, 0.0, 0.0));
    }

    // Summer 2020: schools partially reopen, most restrictions lifted.
    let start_summer = Date::new(2020, 5, 15)?;
    if start_summer < end_date {
        let t = day_of(start_summer);
        let school_reopen = day_of(Date::new(2020, 6, 15)?);
        dampings.push(contacts_at_home(t, 0.0, 0.2));
        dampings.push(school_closure(t, 0.5, 0.5));
        dampings.push(school_closure(school_reopen, 0.0, 0.0));
        dampings.push(home_office(t, 0.2, 0.3));
        dampings.push(social_events(t, 0.0, 0.2));
        dampings.push(social_events_work(t, 0.0, 0.05));
        dampings.push(physical_distancing_home_school(t, 0.0, 0.2));
        dampings.push(physical_distancing_work_other(t, 0.0, 0.2));
        dampings.push(senior_awareness(t, 0.0, 0.0));
    }

    let (masks_min, masks_max) = if args.masks { (0.4, 0.6) } else { (0.2, 0.4) };

    // Autumn: renewed attention, a month later in the late scenario.
    let start_autumn = if args.late {
        Date::new(2020, 11, 1)?
    } else {
        Date::new(2020, 10, 1)?
    };
    if start_autumn < end_date {
        let t = day_of(start_autumn);
        dampings.push(contacts_at_home(t, 0.2, 0.4));
        dampings.push(physical_distancing_home_school(t, 0.2, 0.4));
        dampings.push(physical_distancing_work_other(t, masks_min, masks_max));
    }

    // Autumn lockdown light.
    let start_autumn_lockdown = Date::new(2020, 11, 1)?;
    if start_autumn_lockdown < end_date {
        let t = day_of(start_autumn_lockdown);
        dampings.push(contacts_at_home(t, 0.4, 0.6));
        dampings.push(school_closure(t, 0.0, 0.0));
        dampings.push(home_office(t, 0.2, 0.3));
        dampings.push(social_events(t, 0.6, 0.8));
        dampings.push(social_events_work(t, 0.0, 0.1));
        dampings.push(physical_distancing_home_school(t, 0.2, 0.4));
        dampings.push(physical_distancing_work_other(t, masks_min, masks_max));
        dampings.push(senior_awareness(t, 0.0, 0.0));
    }

    // Winter lockdown with a relaxation over the holidays.
    let start_winter_lockdown = Date::new(2020, 12, 16)?;
    if start_winter_lockdown < end_date {
        let t = day_of(start_winter_lockdown);
        dampings.push(contacts_at_home(t, 0.6, 0.8));
        dampings.push(school_closure(t, 1.0, 1.0));
        dampings.push(home_office(t, 0.2, 0.3));
        dampings.push(social_events(t, 0.6, 0.8));
        dampings.push(social_events_work(t, 0.1, 0.2));
        dampings.push(physical_distancing_home_school(t, 0.2, 0.4));
        dampings.push(physical_distancing_work_other(t, 0.6, 0.8));
        dampings.push(senior_awareness(t, 0.0, 0.0));

        let xmas = day_of(Date::new(2020, 12, 24)?);
        dampings.push(contacts_at_home(xmas, 0.0, 0.0));
        dampings.push(home_office(xmas, 0.4, 0.5));
        dampings.push(social_events(xmas, 0.4, 0.6));
        dampings.push(physical_distancing_home_school(xmas, 0.0, 0.0));
        dampings.push(physical_distancing_work_other(xmas, 0.4, 0.6));

        let after_xmas = day_of(Date::new(2020, 12, 27)?);
        dampings.push(contacts_at_home(after_xmas, 0.6, 0.8));
        dampings.push(home_office(after_xmas, 0.2, 0.3));
        dampings.push(social_events(after_xmas, 0.6, 0.8));
        dampings.push(physical_distancing_home_school(after_xmas, 0.2, 0.4));
        dampings.push(physical_distancing_work_other(after_xmas, 0.6, 0.8));
    }

    params.contact_patterns_mut().dampings = dampings;

    // Local dynamic NPIs, triggered when the weekly incidence per 100 000
    // exceeds the threshold.
    let t0 = SimulationTime(0.0);
    let dynamic_dampings = vec![
        contacts_at_home(t0, 0.6, 0.8),
        school_closure(t0, 0.25, 0.25),
        home_office(t0, 0.2, 0.3),
        social_events(t0, 0.6, 0.8),
        social_events_work(t0, 0.1, 0.2),
        physical_distancing_home_school(t0, 0.6, 0.8),
        physical_distancing_work_other(t0, 0.6, 0.8),
        senior_awareness(t0, 0.0, 0.0),
    ];
    let npis = params.dynamic_npis_mut();
    npis.set_interval(SimulationTime(3.0))?;
    npis.set_duration(SimulationTime(if args.long_time { 90.0 } else { 14.0 }))?;
    npis.set_base_value(100_000.0)?;
    npis.set_threshold(200.0, dynamic_dampings)?;

    // School holidays; the per-node periods are attached in set_nodes.
    params.contact_patterns_mut().school_holiday_damping = Some(damping(
        uncertain(1.0, 1.0),
        InterventionLevel::Holidays,
        Intervention::SchoolClosure,
        SimulationTime(0.0),
        &[ContactLocation::School],
        all_groups(),
    ));

    Ok(())
}

fn set_nodes(
    provider: &impl DataProvider,
    params: &epimet::secir::Parameters,
    start_date: Date,
    end_date: Date,
    graph: &mut Graph<Model, MobilityParameters>,
) -> Result<(), EpiError> {
    let county_ids = provider.get_county_ids()?;
    let population_data = provider.read_population_data(&county_ids, start_date)?;

    for (county_id, population) in county_ids.iter().zip(population_data) {
        let mut model = Model::new(NUM_AGE_GROUPS);
        model.parameters = params.clone();

        for age in AgeGroup::all() {
            for state in InfectionState::ALL {
                model.populations.set(
                    &[age.index(), state.index()],
                    population.compartments[age.index()][state.index()],
                )?;
            }
        }

        // Local test-and-trace capacity proportional to the population.
        let tnt_capacity = model.populations.total() * 7.5 / 100_000.0;
        assign_uniform_distribution(
            model
                .parameters
                .get_scalar_mut(ParameterKey::TestAndTraceCapacity),
            0.8 * tnt_capacity,
            1.2 * tnt_capacity,
        );

        // School holiday periods of the county's state.
        let state_id = provider.get_state_id(*county_id)?;
        let holidays = provider.get_holidays(state_id, start_date, end_date)?;
        model.parameters.contact_patterns_mut().school_holidays = holidays
            .iter()
            .map(|(start, end)| {
                (
                    SimulationTime(f64::from(start.days_since(&start_date))),
                    SimulationTime(f64::from(end.days_since(&start_date))),
                )
            })
            .collect();

        // Uncertainty in the reported compartment values.
        for cell in model.populations.cells_mut() {
            let value = cell.value();
            if value > 0.0 {
                assign_uniform_distribution(cell, 0.9 * value, 1.1 * value);
            }
        }

        model.parameters.contact_patterns_mut().apply_dampings();
        graph.add_node(*county_id, model);
    }
    Ok(())
}

/// Thresholds below which an edge is dropped; they keep the graph sparse
/// while covering more than 99% of all mobility.
const COMMUTER_COEFF_THRESHOLD: f64 = 4e-5;
const TWITTER_COEFF_THRESHOLD: f64 = 1e-5;

fn set_edges(
    provider: &impl DataProvider,
    graph: &mut Graph<Model, MobilityParameters>,
) -> Result<(), EpiError> {
    let commuter = provider.read_mobility_matrix(MobilityKind::Commuter)?;
    let twitter = provider.read_mobility_matrix(MobilityKind::Twitter)?;
    let num_nodes = graph.nodes().len();
    if commuter.nrows() != num_nodes
        || commuter.ncols() != num_nodes
        || twitter.nrows() != num_nodes
        || twitter.ncols() != num_nodes
    {
        return Err(EpiError::DimensionMismatch(format!(
            "mobility matrices must be {num_nodes}x{num_nodes} for {num_nodes} nodes"
        )));
    }

    let migrating: Vec<InfectionState> = InfectionState::ALL
        .iter()
        .copied()
        .filter(|state| state.migrates())
        .collect();

    for i in 0..num_nodes {
        for j in 0..num_nodes {
            if i == j {
                continue;
            }
            let populations = &graph.nodes()[i].property.populations;
            let num_compartments = populations.num_compartments();

            // Working population commutes; the oldest working group is
            // partially retired and only partially commutes.
            let min_commuter_age = 2;
            let max_commuter_age = 4;
            let mut working_population = 0.0;
            for age in min_commuter_age..=max_commuter_age {
                let factor = if age == max_commuter_age { 0.33 } else { 1.0 };
                working_population += populations.group_total(0, age)? * factor;
            }
            let commuter_coeff = if working_population > 0.0 {
                commuter[(i, j)] / working_population
            } else {
                0.0
            };
            let total_population = populations.total();
            let twitter_coeff = if total_population > 0.0 {
                twitter[(i, j)] / total_population
            } else {
                0.0
            };

            if commuter_coeff <= COMMUTER_COEFF_THRESHOLD && twitter_coeff <= TWITTER_COEFF_THRESHOLD
            {
                continue;
            }

            let mut mobility = MobilityParameters::new(ContactLocation::COUNT, num_compartments);
            for age in min_commuter_age..=max_commuter_age {
                let factor = if age == max_commuter_age { 0.33 } else { 1.0 };
                for state in &migrating {
                    let idx = populations.flat_index(&[age, state.index()])?;
                    mobility
                        .coefficients
                        .get_mut(ContactLocation::Work.index())
                        .baseline_mut()[idx] = commuter_coeff * factor;
                }
            }
            for age in 0..NUM_AGE_GROUPS {
                for state in &migrating {
                    let idx = populations.flat_index(&[age, state.index()])?;
                    mobility
                        .coefficients
                        .get_mut(ContactLocation::Other.index())
                        .baseline_mut()[idx] = twitter_coeff;
                }
            }
            graph.add_edge(i, j, mobility)?;
        }
    }
    Ok(())
}

fn create_graph(
    provider: &impl DataProvider,
    start_date: Date,
    end_date: Date,
    args: &Args,
) -> Result<Graph<Model, MobilityParameters>, EpiError> {
    let mut params = epimet::secir::Parameters::new(NUM_AGE_GROUPS);
    params.set_start_day(f64::from(start_date.day_in_year()));
    set_covid_parameters(&mut params, args.high);
    set_contact_matrices(provider, &mut params)?;
    set_npis(start_date, end_date, &mut params, args)?;

    let mut graph = Graph::new();
    set_nodes(provider, &params, start_date, end_date, &mut graph)?;
    set_edges(provider, &mut graph)?;
    Ok(graph)
}

fn run(args: &Args) -> Result<(), EpiError> {
    let start_date = Date::from_str(&args.start_date)?;
    let end_date = start_date.offset_by_days(args.num_days as i32);
    let num_days = f64::from(args.num_days);

    let (graph, result_dir) = match args.dirs.len() {
        3 => {
            let provider = {
                let mut p = FileDataProvider::new(args.dirs[0].clone());
                p.scaling_factor_infected = vec![2.5; NUM_AGE_GROUPS];
                p
            };
            let graph = create_graph(&provider, start_date, end_date, args)?;
            write_graph(&graph, &args.dirs[1])?;
            log::info!(
                "created graph with {} nodes and {} edges, saved to {}",
                graph.nodes().len(),
                graph.edges().len(),
                args.dirs[1].display()
            );
            (graph, args.dirs[2].clone())
        }
        2 => {
            let graph = read_graph::<Model>(&args.dirs[0])?;
            log::info!(
                "loaded graph with {} nodes from {}",
                graph.nodes().len(),
                args.dirs[0].display()
            );
            (graph, args.dirs[1].clone())
        }
        _ => unreachable!("clap enforces 2..=3 positional arguments"),
    };

    let mut study = ParameterStudy::new(graph, 0.0, num_days, 0.5, args.num_runs)?;
    study.set_seed(args.seed);
    // Without --future, dynamic NPIs only keep triggering within the
    // near-term policy horizon.
    if !args.future {
        study.set_end_dynamic_npis(num_days.min(30.0));
    }

    let sink = DirectoryResultSink::new(result_dir);
    let mut ensemble: Vec<Vec<NodeResult<Model>>> = Vec::with_capacity(args.num_runs);
    let mut sink_error: Option<EpiError> = None;
    let save_single_runs = args.save_single_runs;

    let successful = study.run(
        draw_sample_graph,
        |results, run_idx| {
            if save_single_runs && sink_error.is_none() {
                if let Err(error) = sink.save_result_with_params(&results, run_idx) {
                    sink_error = Some(error);
                }
            }
            ensemble.push(results);
        },
    )?;
    if let Some(error) = sink_error {
        return Err(error);
    }
    sink.save_results(&ensemble, false)?;
    log::info!("{successful} of {} runs completed", args.num_runs);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = args
        .log_level
        .as_deref()
        .and_then(|l| LevelFilter::from_str(l).ok())
        .unwrap_or(LevelFilter::Warn);
    set_log_level(level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
