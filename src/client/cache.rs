use crate::models::{BookingRow, BookingStatus, BookingType, Diary, Patient, Uid};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub diary_uid: Uid,
    pub entity_uid: Uid,
}

/// Effect of a reconciliation or explicit selection on the current diary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Changed(Selection),
    Cleared,
}

impl Selection {
    fn of(diary: &Diary) -> Self {
        Self {
            diary_uid: diary.uid,
            entity_uid: diary.entity_uid,
        }
    }
}

/// Last fetched lists plus the current diary/date selection.
///
/// Every list is replaced wholesale on refresh; there is no merging, and a
/// slower response that lands later simply wins.
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    diaries: Vec<Diary>,
    selection: Option<Selection>,
    selected_date: Option<NaiveDate>,
    status_names: BTreeMap<Uid, String>,
    booking_types: Vec<BookingType>,
    patients: Vec<Patient>,
    bookings: Vec<BookingRow>,
}

impl ResourceCache {
    pub fn diaries(&self) -> &[Diary] {
        &self.diaries
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    pub fn set_selected_date(&mut self, date: Option<NaiveDate>) {
        self.selected_date = date;
    }

    /// Replaces the diary list and re-resolves the selection against it.
    ///
    /// Keeps the previous diary when it is still listed, otherwise falls back
    /// to the first entry (or nothing). Anything but `Unchanged` means the
    /// effective selection moved, so callers cascade at most once per list.
    pub fn reconcile_diaries(&mut self, diaries: Vec<Diary>) -> SelectionChange {
        let previous = self.selection;
        let next = previous
            .and_then(|selection| diaries.iter().find(|diary| diary.uid == selection.diary_uid))
            .or_else(|| diaries.first())
            .map(Selection::of);

        self.diaries = diaries;
        self.apply_selection(previous, next)
    }

    /// Explicit selection by the user. `None` when the uid is not listed.
    pub fn select_diary(&mut self, uid: Uid) -> Option<SelectionChange> {
        let diary = self.diaries.iter().find(|diary| diary.uid == uid)?;
        let next = Some(Selection::of(diary));
        Some(self.apply_selection(self.selection, next))
    }

    fn apply_selection(
        &mut self,
        previous: Option<Selection>,
        next: Option<Selection>,
    ) -> SelectionChange {
        if previous == next {
            return SelectionChange::Unchanged;
        }
        self.selection = next;
        match next {
            Some(selection) => SelectionChange::Changed(selection),
            None => {
                self.status_names.clear();
                self.bookings.clear();
                SelectionChange::Cleared
            }
        }
    }

    pub fn replace_statuses(&mut self, statuses: Vec<BookingStatus>) {
        self.status_names = statuses
            .into_iter()
            .map(|status| (status.uid, status.name))
            .collect();
    }

    pub fn status_names(&self) -> &BTreeMap<Uid, String> {
        &self.status_names
    }

    pub fn status_name(&self, uid: Option<Uid>) -> Option<&str> {
        uid.and_then(|uid| self.status_names.get(&uid))
            .map(String::as_str)
    }

    pub fn replace_booking_types(&mut self, types: Vec<BookingType>) {
        self.booking_types = types;
    }

    pub fn booking_types(&self) -> &[BookingType] {
        &self.booking_types
    }

    pub fn replace_patients(&mut self, patients: Vec<Patient>) {
        self.patients = patients;
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn replace_bookings(&mut self, bookings: Vec<BookingRow>) {
        self.bookings = bookings;
    }

    pub fn bookings(&self) -> &[BookingRow] {
        &self.bookings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diary(uid: i64, entity: i64) -> Diary {
        Diary {
            uid: Uid(uid),
            name: format!("Diary {uid}"),
            entity_uid: Uid(entity),
        }
    }

    #[test]
    fn first_refresh_selects_first_diary() {
        let mut cache = ResourceCache::default();
        let change = cache.reconcile_diaries(vec![diary(10, 1), diary(20, 2)]);
        let expected = Selection {
            diary_uid: Uid(10),
            entity_uid: Uid(1),
        };
        assert_eq!(change, SelectionChange::Changed(expected));
        assert_eq!(cache.selection(), Some(expected));
    }

    #[test]
    fn reconcile_is_idempotent_for_same_list() {
        let mut cache = ResourceCache::default();
        let list = vec![diary(10, 1), diary(20, 2)];

        assert_ne!(cache.reconcile_diaries(list.clone()), SelectionChange::Unchanged);
        let selection = cache.selection();
        assert_eq!(cache.reconcile_diaries(list), SelectionChange::Unchanged);
        assert_eq!(cache.selection(), selection);
    }

    #[test]
    fn previous_selection_survives_reordering() {
        let mut cache = ResourceCache::default();
        cache.reconcile_diaries(vec![diary(10, 1), diary(20, 2)]);
        cache.select_diary(Uid(20)).unwrap();

        let change = cache.reconcile_diaries(vec![diary(30, 3), diary(20, 2)]);
        assert_eq!(change, SelectionChange::Unchanged);
        assert_eq!(cache.selection().unwrap().diary_uid, Uid(20));
    }

    #[test]
    fn vanished_selection_falls_back_to_first() {
        let mut cache = ResourceCache::default();
        cache.reconcile_diaries(vec![diary(10, 1), diary(20, 2)]);
        cache.select_diary(Uid(20)).unwrap();

        let change = cache.reconcile_diaries(vec![diary(30, 3), diary(40, 4)]);
        assert_eq!(
            change,
            SelectionChange::Changed(Selection {
                diary_uid: Uid(30),
                entity_uid: Uid(3),
            })
        );
    }

    #[test]
    fn entity_change_on_same_diary_counts_as_change() {
        let mut cache = ResourceCache::default();
        cache.reconcile_diaries(vec![diary(10, 1)]);

        let change = cache.reconcile_diaries(vec![diary(10, 9)]);
        assert_eq!(cache.selection().unwrap().entity_uid, Uid(9));
        assert!(matches!(change, SelectionChange::Changed(_)));
    }

    #[test]
    fn empty_list_clears_selection_and_dependents() {
        let mut cache = ResourceCache::default();
        cache.reconcile_diaries(vec![diary(10, 1)]);
        cache.replace_statuses(vec![BookingStatus {
            uid: Uid(1),
            name: "Booked".to_string(),
        }]);

        assert_eq!(cache.reconcile_diaries(Vec::new()), SelectionChange::Cleared);
        assert_eq!(cache.selection(), None);
        assert!(cache.status_names().is_empty());
        assert_eq!(cache.reconcile_diaries(Vec::new()), SelectionChange::Unchanged);
    }

    #[test]
    fn selecting_unknown_diary_is_refused() {
        let mut cache = ResourceCache::default();
        cache.reconcile_diaries(vec![diary(10, 1)]);
        assert!(cache.select_diary(Uid(99)).is_none());
        assert_eq!(cache.select_diary(Uid(10)), Some(SelectionChange::Unchanged));
    }
}
