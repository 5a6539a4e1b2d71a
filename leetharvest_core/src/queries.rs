//! GraphQL documents for the LeetCode endpoint.
//!
//! The service routes on `operationName`, so each document is paired with
//! its operation name constant.

pub const OP_SUBMISSION_LIST: &str = "submissionList";

pub const QUERY_SUBMISSION_LIST: &str = r#"
query submissionList($offset: Int!, $limit: Int!) {
    submissionList(offset: $offset, limit: $limit) {
        hasNext
        submissions {
            id
            statusDisplay
            lang
            runtime
            memory
            timestamp
            title
            titleSlug
        }
    }
}
"#;

pub const OP_SUBMISSION_DETAILS: &str = "submissionDetails";

pub const QUERY_SUBMISSION_DETAILS: &str = r#"
query submissionDetails($submissionId: Int!) {
    submissionDetails(submissionId: $submissionId) {
        runtime
        runtimeDisplay
        runtimePercentile
        memory
        memoryDisplay
        memoryPercentile
        code
        timestamp
        statusCode
        user {
            username
            profile {
                realName
            }
        }
        lang {
            name
            verboseName
        }
        question {
            questionId
            titleSlug
            hasFrontendPreview
        }
        notes
        flagType
        topicTags {
            tagId
            slug
            name
        }
        runtimeError
        compileError
        lastTestcase
        codeOutput
        expectedOutput
        totalCorrect
        totalTestcases
        fullCodeOutput
        testDescriptions
        testBodies
        testInfo
        stdOutput
    }
}
"#;

pub const OP_SELECT_PROBLEM: &str = "selectProblem";

pub const QUERY_PROBLEM_DETAILS: &str = r#"
query selectProblem($titleSlug: String!) {
    question(titleSlug: $titleSlug) {
        questionId
        title
        titleSlug
        content
        difficulty
        stats
        topicTags {
            name
            slug
            translatedName
        }
        hints
        codeSnippets {
            lang
            langSlug
            code
        }
    }
}
"#;

pub const OP_USER_STATUS: &str = "globalData";

pub const QUERY_USER_STATUS: &str = r#"
query globalData {
    userStatus {
        username
        isSignedIn
        isPremium
    }
}
"#;
