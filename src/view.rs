/// Which chart the dashboard is showing. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Portfolio,
    Margin,
    Market,
}

impl ViewMode {
    /// Tab order, left to right.
    pub const ALL: [ViewMode; 3] = [ViewMode::Portfolio, ViewMode::Margin, ViewMode::Market];

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Portfolio => "Portfolio Values",
            ViewMode::Margin => "Margin Loans",
            ViewMode::Market => "Market Returns",
        }
    }

    pub fn index(self) -> usize {
        match self {
            ViewMode::Portfolio => 0,
            ViewMode::Margin => 1,
            ViewMode::Market => 2,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}
