text_enum! {
    /// Kind of user action recorded in the activity ledger.
    pub enum ActivityType as "activity type" {
        Registration => "registration",
        Login => "login",
        Logout => "logout",
        DashboardViewed => "dashboard_viewed",
        FilterApplied => "filter_applied",
        SentimentCorrected => "sentiment_corrected",
        SourceConfigured => "source_configured",
        SourceAdded => "source_added",
        SourceDeleted => "source_deleted",
        ManualRefreshTriggered => "manual_refresh_triggered",
        FirstSourceConfiguredSuccessfully => "first_source_configured_successfully",
    }
}

impl ActivityType {
    /// Types a client may report directly. Everything else is emitted by the
    /// operation that performs the state change.
    #[must_use]
    pub const fn is_client_reportable(self) -> bool {
        matches!(
            self,
            ActivityType::Login
                | ActivityType::Logout
                | ActivityType::DashboardViewed
                | ActivityType::FilterApplied
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_side_events_are_not_client_reportable() {
        assert!(!ActivityType::FirstSourceConfiguredSuccessfully.is_client_reportable());
        assert!(!ActivityType::SourceAdded.is_client_reportable());
        assert!(!ActivityType::Registration.is_client_reportable());
        assert!(ActivityType::DashboardViewed.is_client_reportable());
    }

    #[test]
    fn every_type_round_trips() {
        for ty in ActivityType::ALL {
            assert_eq!(ty.as_str().parse::<ActivityType>(), Ok(*ty));
        }
    }
}
