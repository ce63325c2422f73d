/// Two-step confirmation for destructive actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteDialog<T> {
    Closed,
    Confirming(T),
}

impl<T> Default for DeleteDialog<T> {
    fn default() -> Self {
        DeleteDialog::Closed
    }
}

impl<T> DeleteDialog<T> {
    pub fn open(&mut self, target: T) {
        *self = DeleteDialog::Confirming(target);
    }

    pub fn cancel(&mut self) {
        *self = DeleteDialog::Closed;
    }

    /// Close the dialog and hand back what was being confirmed.
    pub fn take(&mut self) -> Option<T> {
        match std::mem::take(self) {
            DeleteDialog::Confirming(target) => Some(target),
            DeleteDialog::Closed => None,
        }
    }

    pub fn target(&self) -> Option<&T> {
        match self {
            DeleteDialog::Confirming(target) => Some(target),
            DeleteDialog::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, DeleteDialog::Confirming(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_take_closes() {
        let mut dialog = DeleteDialog::default();
        assert!(!dialog.is_open());
        dialog.open("chat-1");
        assert_eq!(dialog.target(), Some(&"chat-1"));
        assert_eq!(dialog.take(), Some("chat-1"));
        assert!(!dialog.is_open());
        assert_eq!(dialog.take(), None);
    }

    #[test]
    fn test_cancel() {
        let mut dialog = DeleteDialog::default();
        dialog.open(7);
        dialog.cancel();
        assert_eq!(dialog.take(), None);
    }
}
