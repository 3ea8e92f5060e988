use uuid::Uuid;

use crate::engine::scoring::{score_business, score_volunteer};
use crate::error::AppError;
use crate::geo::distance_between;
use crate::models::business::Business;
use crate::models::emergency::Emergency;
use crate::models::matching::{BusinessScoreBreakdown, VolunteerScoreBreakdown};
use crate::models::volunteer::{HelperStatus, Volunteer};
use crate::store::Store;

/// Candidates must score strictly above this to be offered.
pub const MIN_MATCH_SCORE: u32 = 20;
pub const MAX_VOLUNTEER_MATCHES: usize = 10;
pub const MAX_BUSINESS_MATCHES: usize = 5;

#[derive(Debug, Clone)]
pub struct VolunteerCandidate {
    pub volunteer: Volunteer,
    pub score: u32,
    pub breakdown: VolunteerScoreBreakdown,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BusinessCandidate {
    pub business: Business,
    pub score: u32,
    pub breakdown: BusinessScoreBreakdown,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchCandidates {
    pub volunteers: Vec<VolunteerCandidate>,
    pub businesses: Vec<BusinessCandidate>,
}

impl MatchCandidates {
    pub fn is_empty(&self) -> bool {
        self.volunteers.is_empty() && self.businesses.is_empty()
    }
}

pub async fn find_matches(store: &dyn Store, emergency_id: Uuid) -> Result<MatchCandidates, AppError> {
    let emergency = store
        .get_emergency(emergency_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("emergency {emergency_id} not found")))?;

    let volunteers = store
        .list_volunteers(Some(HelperStatus::Available))
        .await?
        .into_iter()
        .filter(|volunteer| volunteer.availability.within_week())
        .collect();

    let businesses = store.list_businesses(Some(HelperStatus::Available)).await?;

    Ok(rank_candidates(&emergency, volunteers, businesses))
}

/// Scores, thresholds, sorts (stable on fetch order) and truncates both pools.
pub fn rank_candidates(
    emergency: &Emergency,
    volunteers: Vec<Volunteer>,
    businesses: Vec<Business>,
) -> MatchCandidates {
    let mut volunteers: Vec<VolunteerCandidate> = volunteers
        .into_iter()
        .filter_map(|volunteer| {
            let (score, breakdown) = score_volunteer(emergency, &volunteer);
            if score <= MIN_MATCH_SCORE {
                return None;
            }

            let distance_km = distance_between(emergency.location.as_ref(), volunteer.location.as_ref());
            Some(VolunteerCandidate {
                volunteer,
                score,
                breakdown,
                distance_km,
            })
        })
        .collect();
    volunteers.sort_by(|a, b| b.score.cmp(&a.score));
    volunteers.truncate(MAX_VOLUNTEER_MATCHES);

    let mut businesses: Vec<BusinessCandidate> = businesses
        .into_iter()
        .filter_map(|business| {
            let (score, breakdown) = score_business(emergency, &business);
            if score <= MIN_MATCH_SCORE {
                return None;
            }

            let distance_km = distance_between(emergency.location.as_ref(), business.location.as_ref());
            Some(BusinessCandidate {
                business,
                score,
                breakdown,
                distance_km,
            })
        })
        .collect();
    businesses.sort_by(|a, b| b.score.cmp(&a.score));
    businesses.truncate(MAX_BUSINESS_MATCHES);

    MatchCandidates {
        volunteers,
        businesses,
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_BUSINESS_MATCHES, MAX_VOLUNTEER_MATCHES, MIN_MATCH_SCORE, rank_candidates};
    use crate::engine::scoring::tests::{business, emergency, volunteer};
    use crate::geo::Coordinate;
    use crate::models::capability::{NeedSet, Service, Skill};
    use crate::models::emergency::{EmergencyType, Urgency};
    use crate::models::volunteer::Availability;

    #[test]
    fn ranks_nearby_volunteer_first() {
        let crisis = emergency(EmergencyType::Medical, Urgency::Critical, Some(Coordinate::new(40.0, -75.0)));
        let far = volunteer(Some(Coordinate::new(41.0, -76.0)), &[Skill::Medical], Availability::Immediate);
        let near = volunteer(Some(Coordinate::new(40.01, -75.01)), &[Skill::Medical], Availability::Immediate);
        let near_id = near.id;

        let ranked = rank_candidates(&crisis, vec![far, near], vec![]);

        assert_eq!(ranked.volunteers.len(), 2);
        assert_eq!(ranked.volunteers[0].volunteer.id, near_id);
        assert_eq!(ranked.volunteers[0].score, 90);
        assert_eq!(ranked.volunteers[1].score, 40);
        assert!(ranked.volunteers[1].distance_km.unwrap() > 100.0);
    }

    #[test]
    fn drops_candidates_at_or_below_threshold() {
        let crisis = emergency(EmergencyType::Fire, Urgency::Low, None);
        // shelter alignment alone is exactly 20
        let borderline = volunteer(None, &[Skill::Shelter], Availability::Weekends);
        let weak = volunteer(None, &[], Availability::Today);

        let ranked = rank_candidates(&crisis, vec![borderline, weak], vec![]);
        assert!(ranked.volunteers.is_empty());
        assert!(ranked.is_empty());
    }

    #[test]
    fn truncates_and_keeps_fetch_order_on_ties() {
        let crisis = emergency(EmergencyType::Medical, Urgency::Low, None);
        let pool: Vec<_> = (0..15)
            .map(|_| volunteer(None, &[Skill::Medical], Availability::Weekends))
            .collect();
        let ids: Vec<_> = pool.iter().map(|v| v.id).collect();

        let ranked = rank_candidates(&crisis, pool, vec![]);

        assert_eq!(ranked.volunteers.len(), MAX_VOLUNTEER_MATCHES);
        let ranked_ids: Vec<_> = ranked.volunteers.iter().map(|c| c.volunteer.id).collect();
        assert_eq!(ranked_ids, ids[..MAX_VOLUNTEER_MATCHES]);
    }

    #[test]
    fn businesses_sorted_descending_and_capped() {
        let mut crisis = emergency(EmergencyType::Flood, Urgency::Medium, None);
        crisis.specific_needs = ["shelter", "food"].into_iter().collect::<NeedSet>();

        let mut pool = Vec::new();
        for _ in 0..4 {
            pool.push(business(None, &[Service::Food], None, 0));
        }
        for _ in 0..4 {
            pool.push(business(None, &[Service::Shelter, Service::Food], None, 0));
        }
        pool.push(business(None, &[Service::Clothing], None, 0));

        let ranked = rank_candidates(&crisis, vec![], pool);

        assert_eq!(ranked.businesses.len(), MAX_BUSINESS_MATCHES);
        assert!(ranked.businesses.iter().all(|c| c.score > MIN_MATCH_SCORE));
        assert!(ranked.businesses.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert_eq!(ranked.businesses[0].score, 75);
        assert_eq!(ranked.businesses[4].score, 35);
    }
}
