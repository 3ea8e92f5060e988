use crate::geo::distance_between;
use crate::models::business::Business;
use crate::models::capability::{Need, Service, Skill};
use crate::models::emergency::{Emergency, EmergencyType, Urgency};
use crate::models::matching::{BusinessScoreBreakdown, VolunteerScoreBreakdown};
use crate::models::volunteer::{Availability, Volunteer};

const VOLUNTEER_PROXIMITY: &[(f64, u32)] = &[(5.0, 50), (10.0, 40), (25.0, 30), (50.0, 20), (100.0, 10)];
const BUSINESS_PROXIMITY: &[(f64, u32)] = &[(10.0, 40), (25.0, 30), (50.0, 20), (100.0, 10)];

const GENERAL_SKILL_POINTS: u32 = 5;
const GENERAL_SKILLS: &[Skill] = &[Skill::FirstAid, Skill::Cpr, Skill::Transportation];

const VOLUNTEER_CAPACITY_POINTS: u32 = 5;
const SPECIAL_NEEDS_POINTS: u32 = 3;

const SERVICE_POINTS: &[(Need, Service, u32)] = &[
    (Need::Shelter, Service::Shelter, 40),
    (Need::Food, Service::Food, 35),
    (Need::Medical, Service::Medical, 40),
    (Need::Transportation, Service::Transportation, 30),
    (Need::Clothing, Service::Clothing, 25),
    (Need::Financial, Service::FinancialAid, 30),
];

const BUSINESS_CAPACITY_POINTS: u32 = 10;

pub fn score_volunteer(emergency: &Emergency, volunteer: &Volunteer) -> (u32, VolunteerScoreBreakdown) {
    let distance_km = distance_between(emergency.location.as_ref(), volunteer.location.as_ref());

    let breakdown = VolunteerScoreBreakdown {
        proximity: proximity_points(distance_km, VOLUNTEER_PROXIMITY),
        skill_alignment: skill_alignment(emergency.emergency_type, volunteer),
        general_skills: general_skills(volunteer),
        availability: availability_points(volunteer.availability, emergency.urgency),
        capacity: if volunteer.has_capacity() {
            VOLUNTEER_CAPACITY_POINTS
        } else {
            0
        },
        special_needs: special_needs(emergency, volunteer),
    };

    (breakdown.total(), breakdown)
}

pub fn score_business(emergency: &Emergency, business: &Business) -> (u32, BusinessScoreBreakdown) {
    let distance_km = distance_between(emergency.location.as_ref(), business.location.as_ref());

    let services = SERVICE_POINTS
        .iter()
        .filter(|(need, service, _)| {
            emergency.specific_needs.contains(*need) && business.services_offered.contains(*service)
        })
        .map(|(_, _, points)| points)
        .sum();

    let breakdown = BusinessScoreBreakdown {
        proximity: proximity_points(distance_km, BUSINESS_PROXIMITY),
        services,
        capacity: capacity_headroom(business.capacity, business.current_load),
        urgency: business_urgency(emergency.urgency, business.can_handle_critical),
    };

    (breakdown.total(), breakdown)
}

fn proximity_points(distance_km: Option<f64>, buckets: &[(f64, u32)]) -> u32 {
    let Some(distance_km) = distance_km else {
        return 0;
    };

    buckets
        .iter()
        .find(|(limit_km, _)| distance_km <= *limit_km)
        .map_or(0, |(_, points)| *points)
}

fn skill_alignment(emergency_type: EmergencyType, volunteer: &Volunteer) -> u32 {
    let skills = &volunteer.skills;

    match emergency_type {
        EmergencyType::Medical if skills.contains(Skill::Medical) => 30,
        EmergencyType::Fire if skills.contains(Skill::Shelter) => 20,
        EmergencyType::Flood if skills.contains(Skill::Cleanup) || skills.contains(Skill::Shelter) => 20,
        EmergencyType::Earthquake if skills.contains(Skill::Medical) || skills.contains(Skill::Rescue) => 25,
        _ => 0,
    }
}

fn general_skills(volunteer: &Volunteer) -> u32 {
    GENERAL_SKILLS
        .iter()
        .filter(|skill| volunteer.skills.contains(**skill))
        .count() as u32
        * GENERAL_SKILL_POINTS
}

fn availability_points(availability: Availability, urgency: Urgency) -> u32 {
    match (availability, urgency) {
        (Availability::Immediate, Urgency::Critical) => 10,
        (Availability::Today, _) => 7,
        (Availability::ThisWeek, _) => 5,
        _ => 0,
    }
}

fn special_needs(emergency: &Emergency, volunteer: &Volunteer) -> u32 {
    let skills = &volunteer.skills;

    [
        emergency.has_children && skills.contains(Skill::Childcare),
        emergency.has_elderly && skills.contains(Skill::ElderlyCare),
        emergency.has_disabilities && skills.contains(Skill::Medical),
    ]
    .into_iter()
    .filter(|aligned| *aligned)
    .count() as u32
        * SPECIAL_NEEDS_POINTS
}

fn capacity_headroom(capacity: Option<u32>, current_load: u32) -> u32 {
    match capacity {
        Some(capacity) if capacity > 0 => {
            let left = capacity.saturating_sub(current_load);
            BUSINESS_CAPACITY_POINTS * left / capacity
        }
        _ => 0,
    }
}

fn business_urgency(urgency: Urgency, can_handle_critical: bool) -> u32 {
    match urgency {
        Urgency::Critical if can_handle_critical => 10,
        Urgency::High => 7,
        _ => 0,
    }
}
