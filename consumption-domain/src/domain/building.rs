/// One row of the building reference table.
///
/// `commune` is `None` when the reference file leaves the cell empty.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildingRef {
    pub site_id: String,
    pub commune: Option<String>,
}
