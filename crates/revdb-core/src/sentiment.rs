text_enum! {
    /// Sentiment label attached to a review.
    pub enum Sentiment as "sentiment" {
        Positive => "positive",
        Neutral => "neutral",
        Negative => "negative",
    }
}

text_enum! {
    /// Why a sentiment value changed. Only `UserCorrection` has a human actor.
    pub enum ChangeReason as "change reason" {
        AiInitial => "ai_initial",
        UserCorrection => "user_correction",
        Reprocessing => "reprocessing",
    }
}

impl ChangeReason {
    /// True for reasons produced by the classifier rather than a person.
    #[must_use]
    pub const fn is_machine(self) -> bool {
        matches!(self, ChangeReason::AiInitial | ChangeReason::Reprocessing)
    }
}
