use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rdfo_graph::{Graph, NamedGraph, ValidityOutcome};
use rdfo_types::{vocab, IntoUri, Uri};

use crate::change::CommitSummary;
use crate::error::{EntityError, EntityResult};
use crate::stored::StoredEntity;

/// Kinds of organisational unit, from the AIISO vocabulary plus FOAF's
/// generic organisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrgType {
    Center,
    College,
    Department,
    Division,
    Faculty,
    Institute,
    Institution,
    ResearchGroup,
    School,
    Organisation,
}

impl OrgType {
    pub const ALL: [OrgType; 10] = [
        OrgType::Center,
        OrgType::College,
        OrgType::Department,
        OrgType::Division,
        OrgType::Faculty,
        OrgType::Institute,
        OrgType::Institution,
        OrgType::ResearchGroup,
        OrgType::School,
        OrgType::Organisation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OrgType::Center => "Center",
            OrgType::College => "College",
            OrgType::Department => "Department",
            OrgType::Division => "Division",
            OrgType::Faculty => "Faculty",
            OrgType::Institute => "Institute",
            OrgType::Institution => "Institution",
            OrgType::ResearchGroup => "ResearchGroup",
            OrgType::School => "School",
            OrgType::Organisation => "Organisation",
        }
    }

    /// RDF class for this kind.
    pub fn uri(&self) -> Uri {
        match self {
            OrgType::Organisation => vocab::uri(vocab::FOAF_ORGANIZATION),
            other => vocab::uri(vocab::AIISO).join(other.name()),
        }
    }
}

impl fmt::Display for OrgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OrgType {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrgType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| EntityError::UnknownOrgType(s.to_string()))
    }
}

/// An organisation whose statements are grouped into time-bounded
/// assertion groups (named graphs).
///
/// Asking "what was true at T" merges the root with every group valid at T.
#[derive(Debug)]
pub struct OrganisationUnit {
    entity: StoredEntity,
}

impl OrganisationUnit {
    pub fn new(entity: StoredEntity) -> EntityResult<Self> {
        let registry = entity.registry();
        registry.bind_if_absent("aiiso", vocab::AIISO)?;
        registry.bind_if_absent("foaf", vocab::FOAF)?;
        Ok(Self { entity })
    }

    pub fn entity(&self) -> &StoredEntity {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut StoredEntity {
        &mut self.entity
    }

    pub fn into_entity(self) -> StoredEntity {
        self.entity
    }

    /// Current kind, if the root carries one of the known classes.
    pub fn org_type(&self) -> Option<OrgType> {
        let types = self.entity.types();
        OrgType::ALL.into_iter().find(|t| types.contains(&t.uri()))
    }

    /// Replace every type on the root with `org_type`'s class.
    pub fn set_type(&mut self, org_type: OrgType) -> EntityResult<()> {
        self.entity.set_type(org_type.uri())
    }

    pub fn list_assertion_groups(&self) -> Vec<Uri> {
        self.entity.named_graph_uris()
    }

    /// Fetch or create the group `id`. A new group without `valid_from`
    /// starts now.
    pub fn get_assertion_group(
        &mut self,
        id: &str,
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
    ) -> EntityResult<&mut NamedGraph> {
        let valid_from = valid_from.or_else(|| Some(Utc::now()));
        self.entity.add_named_graph(id, valid_from, valid_until)
    }

    /// Validity of a group at `at`, or now.
    pub fn is_assertion_group_valid(
        &self,
        uri: impl IntoUri,
        at: Option<DateTime<Utc>>,
    ) -> EntityResult<ValidityOutcome> {
        self.entity.is_graph_valid(uri, at.unwrap_or_else(Utc::now))
    }

    pub fn set_valid_from(&mut self, uri: impl IntoUri, at: DateTime<Utc>) -> EntityResult<()> {
        self.entity.set_graph_valid_from(uri, at)
    }

    pub fn set_valid_until(&mut self, uri: impl IntoUri, at: DateTime<Utc>) -> EntityResult<()> {
        self.entity.set_graph_valid_until(uri, at)
    }

    pub fn valid_graphs_at(&self, at: DateTime<Utc>) -> Vec<&NamedGraph> {
        self.entity.valid_graphs_at(at)
    }

    /// Root statements merged with every group valid at `at`.
    pub fn assertions_at(&self, at: DateTime<Utc>) -> Graph {
        self.entity.assertions_at(at)
    }

    pub fn commit(&mut self) -> EntityResult<CommitSummary> {
        self.entity.commit()
    }

    pub fn revert(&mut self) -> EntityResult<()> {
        self.entity.revert(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rdfo_graph::Triple;
    use rdfo_store::PartStore;
    use rdfo_types::{Literal, Term};
    use std::sync::Arc;

    fn t(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn unit(id: &str) -> (Arc<PartStore>, OrganisationUnit) {
        let store = Arc::new(PartStore::in_memory("http://example.org/org/").unwrap());
        let entity = StoredEntity::open(store.clone(), id, true).unwrap();
        (store, OrganisationUnit::new(entity).unwrap())
    }

    fn has_name(graph: &Graph, name: &str) -> bool {
        let name = Term::Literal(Literal::string(name));
        graph.iter().any(|Triple { object, .. }| *object == name)
    }

    #[test]
    fn org_type_names_and_classes() {
        assert_eq!("ResearchGroup".parse::<OrgType>().unwrap(), OrgType::ResearchGroup);
        assert!("Club".parse::<OrgType>().is_err());
        assert_eq!(OrgType::Organisation.uri().as_str(), vocab::FOAF_ORGANIZATION);
        assert_eq!(
            OrgType::Department.uri().as_str(),
            "http://purl.org/vocab/aiiso/schema#Department"
        );
        for t in OrgType::ALL {
            assert_eq!(t.to_string().parse::<OrgType>().unwrap(), t);
        }
    }

    #[test]
    fn set_type_replaces_previous() {
        let (_, mut org) = unit("chem");
        org.set_type(OrgType::Department).unwrap();
        org.set_type(OrgType::Faculty).unwrap();
        assert_eq!(org.org_type(), Some(OrgType::Faculty));
        assert_eq!(org.entity().types().len(), 1);
    }

    #[test]
    fn assertions_follow_validity_windows() {
        let (store, mut org) = unit("chem");
        org.set_type(OrgType::Department).unwrap();
        org.get_assertion_group("names-2019", Some(t(2019, 1, 1)), Some(t(2019, 12, 31)))
            .unwrap()
            .add_triple("http://example.org/org/chem", "foaf:name", "Chemistry Dept", true)
            .unwrap();
        org.get_assertion_group("names-2020", Some(t(2020, 1, 1)), None)
            .unwrap()
            .add_triple("http://example.org/org/chem", "foaf:name", "School of Chemistry", true)
            .unwrap();
        org.commit().unwrap();
        assert_eq!(org.list_assertion_groups().len(), 2);

        let mid_2019 = org.assertions_at(t(2019, 6, 1));
        assert!(has_name(&mid_2019, "Chemistry Dept"));
        assert!(!has_name(&mid_2019, "School of Chemistry"));

        let later = org.assertions_at(t(2024, 1, 1));
        assert!(has_name(&later, "School of Chemistry"));
        assert!(!has_name(&later, "Chemistry Dept"));
        assert!(org.assertions_at(t(2018, 1, 1)).iter().all(|tr| tr.predicate.as_str() != "http://xmlns.com/foaf/0.1/name"));

        let reopened = StoredEntity::open(store, "chem", false).unwrap();
        let org = OrganisationUnit::new(reopened).unwrap();
        assert_eq!(org.org_type(), Some(OrgType::Department));
        assert_eq!(org.valid_graphs_at(t(2019, 12, 31)).len(), 1);
    }

    #[test]
    fn group_validity_checks() {
        let (_, mut org) = unit("phys");
        org.get_assertion_group("g", Some(t(2020, 1, 1)), None).unwrap();
        let g = org.list_assertion_groups()[0].clone();

        let outcome = org.is_assertion_group_valid(&g, Some(t(2019, 1, 1))).unwrap();
        assert!(!outcome.is_valid());
        assert!(org.is_assertion_group_valid(&g, None).unwrap().is_valid());

        org.set_valid_until(&g, t(2020, 12, 31)).unwrap();
        assert!(org.is_assertion_group_valid(&g, Some(t(2020, 12, 31))).unwrap().is_valid());
        assert!(!org.is_assertion_group_valid(&g, Some(t(2021, 1, 1))).unwrap().is_valid());

        org.set_valid_from(&g, t(2018, 1, 1)).unwrap();
        assert!(org.is_assertion_group_valid(&g, Some(t(2019, 1, 1))).unwrap().is_valid());

        let missing = org.is_assertion_group_valid("http://example.org/org/phys/nope", None);
        assert!(missing.unwrap_err().is_not_found());
    }

    #[test]
    fn new_group_defaults_to_now() {
        let (_, mut org) = unit("bio");
        let before = Utc::now();
        let from = org.get_assertion_group("g", None, None).unwrap().validity().from().unwrap();
        assert!(from >= before);
    }

    #[test]
    fn revert_drops_uncommitted_type() {
        let (_, mut org) = unit("maths");
        org.commit().unwrap();
        org.set_type(OrgType::School).unwrap();
        org.revert().unwrap();
        assert_eq!(org.org_type(), None);
    }
}
