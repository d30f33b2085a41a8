use serde::{Deserialize, Serialize};

use crate::content::{ContentStatus, PinState, ShowState};
use crate::schema::{MemberAction, Role};

/// What the viewer may do with one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPermission {
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_close: bool,
    pub can_reopen: bool,
    pub can_pin: bool,
    pub can_unpin: bool,
    pub can_hide: bool,
    pub can_show: bool,
    pub can_recover: bool,
}

impl ContentPermission {
    /// Staff may do everything; owners may edit their own items
    pub fn for_viewer(role: Role, is_owner: bool) -> Self {
        if role.is_staff() {
            return Self {
                can_edit: true,
                can_delete: true,
                can_close: true,
                can_reopen: true,
                can_pin: true,
                can_unpin: true,
                can_hide: true,
                can_show: true,
                can_recover: true,
            };
        }
        Self {
            can_edit: is_owner,
            ..Default::default()
        }
    }

    /// Drop the flags that make no sense for the item's current state
    pub fn adjust(&mut self, status: Option<ContentStatus>, pin: PinState, show: ShowState) {
        if status == Some(ContentStatus::Closed) {
            self.can_close = false;
        } else {
            self.can_reopen = false;
        }
        match pin {
            PinState::Pin => {
                self.can_pin = false;
                self.can_hide = false;
            }
            PinState::UnPin => self.can_unpin = false,
        }
        match show {
            ShowState::Show => self.can_show = false,
            ShowState::Hide => {
                self.can_hide = false;
                self.can_pin = false;
            }
        }
    }

    pub fn member_actions(&self, logged_in: bool, is_owner: bool, status: Option<ContentStatus>) -> Vec<MemberAction> {
        let deleted = status == Some(ContentStatus::Deleted);
        let mut actions = Vec::new();

        if logged_in {
            actions.push(action("report", "Flag", "reason"));
        }
        if (self.can_edit || is_owner) && !deleted {
            actions.push(action("edit", "Edit", "edit"));
        }
        if self.can_close && status == Some(ContentStatus::Available) {
            actions.push(action("close", "Close", "confirm"));
        }
        let toggles = [
            (self.can_reopen, "reopen", "Reopen"),
            (self.can_pin, "pin", "Pin"),
            (self.can_hide, "hide", "Hide"),
            (self.can_unpin, "unpin", "Unpin"),
            (self.can_show, "show", "Show"),
        ];
        for (allowed, name, label) in toggles {
            if allowed {
                actions.push(action(name, label, "confirm"));
            }
        }
        if (self.can_delete || is_owner) && !deleted {
            actions.push(action("delete", "Delete", "confirm"));
        }
        if self.can_recover && deleted {
            actions.push(action("undelete", "Undelete", "confirm"));
        }
        actions
    }
}

fn action(action: &str, name: &str, kind: &str) -> MemberAction {
    MemberAction {
        action: action.to_string(),
        name: name.to_string(),
        kind: kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(actions: &[MemberAction]) -> Vec<&str> {
        actions.iter().map(|a| a.action.as_str()).collect()
    }

    #[test]
    fn test_owner_actions() {
        let mut perm = ContentPermission::for_viewer(Role::User, true);
        perm.adjust(Some(ContentStatus::Available), PinState::UnPin, ShowState::Show);
        let actions = perm.member_actions(true, true, Some(ContentStatus::Available));
        assert_eq!(names(&actions), vec!["report", "edit", "delete"]);
        assert_eq!(actions[0].kind, "reason");
    }

    #[test]
    fn test_staff_on_pinned_item() {
        let mut perm = ContentPermission::for_viewer(Role::Admin, false);
        perm.adjust(Some(ContentStatus::Available), PinState::Pin, ShowState::Show);
        assert!(!perm.can_pin && !perm.can_hide && !perm.can_reopen && !perm.can_show);
        assert!(perm.can_unpin && perm.can_close);
        let actions = perm.member_actions(true, false, Some(ContentStatus::Available));
        assert_eq!(names(&actions), vec!["report", "edit", "close", "unpin", "delete"]);
    }

    #[test]
    fn test_hidden_item_cannot_be_pinned() {
        let mut perm = ContentPermission::for_viewer(Role::Moderator, false);
        perm.adjust(Some(ContentStatus::Closed), PinState::UnPin, ShowState::Hide);
        assert!(!perm.can_pin && !perm.can_hide && !perm.can_close);
        assert!(perm.can_show && perm.can_reopen);
    }

    #[test]
    fn test_deleted_item_offers_undelete_only() {
        let mut perm = ContentPermission::for_viewer(Role::Admin, false);
        perm.adjust(Some(ContentStatus::Deleted), PinState::UnPin, ShowState::Show);
        let actions = perm.member_actions(true, false, Some(ContentStatus::Deleted));
        assert_eq!(names(&actions), vec!["report", "pin", "hide", "undelete"]);
    }

    #[test]
    fn test_anonymous_gets_nothing() {
        let perm = ContentPermission::for_viewer(Role::User, false);
        assert!(perm.member_actions(false, false, Some(ContentStatus::Available)).is_empty());
    }
}
