use crate::errors::{AppError, AppResult};
use crate::models::{AdRecord, GroupAssignment, GroupId, GROUP_SEPARATOR, UNGROUPED_ZONE};

/// Where a drag gesture dropped a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Ungrouped,
    Group(GroupId),
}

impl DropTarget {
    /// Decodes the client's zone id: the reserved `ungrouped` sentinel or a
    /// group display string.
    pub fn parse(zone_id: &str) -> AppResult<Self> {
        if zone_id == UNGROUPED_ZONE {
            return Ok(Self::Ungrouped);
        }
        GroupId::parse(zone_id)
            .map(Self::Group)
            .ok_or_else(|| AppError::Validation(format!("unrecognized drop zone: {zone_id}")))
    }
}

/// The dashboard's single mutable state: the record store, the group registry
/// (creation order, brands tracked on the groups themselves so empty groups
/// survive), and dirty tracking for the save flow.
///
/// `revision` bumps on every mutation; `save` snapshots it so a mutation made
/// while a write is in flight keeps the state dirty.
#[derive(Debug, Default)]
pub struct DashboardState {
    records: Vec<AdRecord>,
    groups: Vec<GroupId>,
    dirty: bool,
    revision: u64,
}

impl DashboardState {
    /// Seeds the store from a fetched record list. The registry is derived
    /// from the distinct group cells already present, first-seen order.
    pub fn seed(records: Vec<AdRecord>) -> Self {
        let mut groups: Vec<GroupId> = Vec::new();
        for ad in &records {
            if let Some(group) = &ad.group {
                if !groups.contains(group) {
                    groups.push(group.clone());
                }
            }
        }
        Self {
            records,
            groups,
            dirty: false,
            revision: 0,
        }
    }

    pub fn records(&self) -> &[AdRecord] {
        &self.records
    }

    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    /// Registers a new empty group for `brand`. Does not move any records;
    /// callers pass the current selection to [`Self::assign_records`].
    pub fn create_group(&mut self, brand: &str, name: &str) -> AppResult<GroupId> {
        let name = validate_name(name)?;
        let brand = brand.trim();
        if brand.is_empty() {
            return Err(AppError::Validation("brand must not be empty".to_string()));
        }
        if brand.contains(GROUP_SEPARATOR) {
            return Err(AppError::Validation(format!(
                "brand must not contain {GROUP_SEPARATOR}"
            )));
        }
        let group = GroupId::new(brand, name);
        self.groups.push(group.clone());
        self.touch();
        Ok(group)
    }

    /// Moves every listed record into `group`. Unknown ids are skipped; the
    /// gesture must never fail because a card disappeared under it.
    pub fn assign_records(&mut self, group: &GroupId, library_ids: &[String]) -> AppResult<()> {
        if !self.groups.contains(group) {
            return Err(AppError::NotFound(format!("group not registered: {group}")));
        }
        let mut hits = 0usize;
        for ad in &mut self.records {
            if library_ids.iter().any(|id| *id == ad.library_id) {
                ad.group = Some(group.clone());
                hits += 1;
            }
        }
        if hits > 0 {
            self.touch();
        }
        Ok(())
    }

    /// Renames a registered group: same brand and token, new name. The
    /// registry entry and every member record update in the same call, so no
    /// observer ever sees the old id unmapped.
    pub fn rename_group(&mut self, old: &GroupId, new_name: &str) -> AppResult<GroupId> {
        let new_name = validate_name(new_name)?;
        let slot = self
            .groups
            .iter()
            .position(|group| group == old)
            .ok_or_else(|| AppError::NotFound(format!("group not registered: {old}")))?;

        let renamed = old.renamed(new_name);
        self.groups[slot] = renamed.clone();
        for ad in &mut self.records {
            if ad.group.as_ref() == Some(old) {
                ad.group = Some(renamed.clone());
            }
        }
        self.touch();
        Ok(renamed)
    }

    /// Drops the group and returns its members to the ungrouped pool. A group
    /// with zero members deletes cleanly. Tokens are never reused, so a
    /// deleted id stays dead.
    pub fn delete_group(&mut self, group: &GroupId) -> AppResult<()> {
        let slot = self
            .groups
            .iter()
            .position(|entry| entry == group)
            .ok_or_else(|| AppError::NotFound(format!("group not registered: {group}")))?;
        self.groups.remove(slot);
        for ad in &mut self.records {
            if ad.group.as_ref() == Some(group) {
                ad.group = None;
            }
        }
        self.touch();
        Ok(())
    }

    /// Reacts to a drop gesture. Unknown record ids are a logged no-op; a
    /// stale card must not take the session down.
    pub fn move_record(&mut self, library_id: &str, dest: &DropTarget) -> AppResult<()> {
        if let DropTarget::Group(group) = dest {
            if !self.groups.contains(group) {
                return Err(AppError::NotFound(format!("group not registered: {group}")));
            }
        }
        let Some(ad) = self
            .records
            .iter_mut()
            .find(|ad| ad.library_id == library_id)
        else {
            tracing::warn!(library_id, "drop gesture for unknown record; ignoring");
            return Ok(());
        };
        ad.group = match dest {
            DropTarget::Ungrouped => None,
            DropTarget::Group(group) => Some(group.clone()),
        };
        self.touch();
        Ok(())
    }

    /// Looks up a registry entry by its display string.
    pub fn find_group(&self, display: &str) -> AppResult<GroupId> {
        let parsed = GroupId::parse(display)
            .ok_or_else(|| AppError::Validation(format!("malformed group id: {display}")))?;
        self.groups
            .iter()
            .find(|group| **group == parsed)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("group not registered: {display}")))
    }

    /// Every record's group cell in store order, for the save-back call.
    pub fn assignments(&self) -> Vec<GroupAssignment> {
        self.records
            .iter()
            .map(|ad| GroupAssignment {
                library_id: ad.library_id.clone(),
                group: ad
                    .group
                    .as_ref()
                    .map(GroupId::display_string)
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Clears the dirty flag if nothing mutated since the `revision` snapshot
    /// was taken. Returns whether the flag was cleared.
    pub fn mark_saved(&mut self, snapshot_revision: u64) -> bool {
        if self.revision == snapshot_revision {
            self.dirty = false;
            true
        } else {
            tracing::debug!(
                snapshot_revision,
                current = self.revision,
                "state mutated during save; staying dirty"
            );
            false
        }
    }
}

fn validate_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "group name must not be empty".to_string(),
        ));
    }
    if name.contains(GROUP_SEPARATOR) {
        return Err(AppError::Validation(format!(
            "group name must not contain {GROUP_SEPARATOR}"
        )));
    }
    Ok(name)
}
