/// Every remote call the engine makes, by name. The GraphQL text lives here
/// so the rest of the crate only ever refers to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewerLogin,
    Repository,
    OwnerId,
    CreateRepository,
    Labels,
    CreateLabel,
    UpdateLabel,
    Milestones,
    CreateMilestone,
    UpdateMilestone,
    Issues,
    IssueComments,
    CreateIssue,
    UpdateIssue,
    AddComment,
    CloseIssue,
    Project,
    CreateProject,
    CreateField,
    CreateIterationField,
    ProjectItems,
    AddProjectItem,
    UpdateItemFieldValue,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ViewerLogin => "ViewerLogin",
            Operation::Repository => "Repository",
            Operation::OwnerId => "OwnerId",
            Operation::CreateRepository => "CreateRepository",
            Operation::Labels => "Labels",
            Operation::CreateLabel => "CreateLabel",
            Operation::UpdateLabel => "UpdateLabel",
            Operation::Milestones => "Milestones",
            Operation::CreateMilestone => "CreateMilestone",
            Operation::UpdateMilestone => "UpdateMilestone",
            Operation::Issues => "Issues",
            Operation::IssueComments => "IssueComments",
            Operation::CreateIssue => "CreateIssue",
            Operation::UpdateIssue => "UpdateIssue",
            Operation::AddComment => "AddComment",
            Operation::CloseIssue => "CloseIssue",
            Operation::Project => "Project",
            Operation::CreateProject => "CreateProject",
            Operation::CreateField => "CreateField",
            Operation::CreateIterationField => "CreateIterationField",
            Operation::ProjectItems => "ProjectItems",
            Operation::AddProjectItem => "AddProjectItem",
            Operation::UpdateItemFieldValue => "UpdateItemFieldValue",
        }
    }

    #[cfg(test)]
    pub fn is_mutation(&self) -> bool {
        self.document().starts_with("mutation")
    }

    pub fn document(&self) -> &'static str {
        match self {
            Operation::ViewerLogin => "query ViewerLogin { viewer { login } }",
            Operation::Repository => r#"query Repository($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) { id isPrivate description }
}"#,
            Operation::OwnerId => r#"query OwnerId($login: String!) {
  repositoryOwner(login: $login) { id }
}"#,
            Operation::CreateRepository => r#"mutation CreateRepository($ownerId: ID!, $name: String!, $visibility: RepositoryVisibility!, $description: String) {
  createRepository(input: {ownerId: $ownerId, name: $name, visibility: $visibility, description: $description}) {
    repository { id }
  }
}"#,
            Operation::Labels => r#"query Labels($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    labels(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes { id name color description }
    }
  }
}"#,
            Operation::CreateLabel => r#"mutation CreateLabel($repoId: ID!, $name: String!, $color: String!, $description: String) {
  createLabel(input: {repositoryId: $repoId, name: $name, color: $color, description: $description}) {
    label { id }
  }
}"#,
            Operation::UpdateLabel => r#"mutation UpdateLabel($id: ID!, $name: String!, $color: String!, $description: String) {
  updateLabel(input: {id: $id, name: $name, color: $color, description: $description}) {
    label { id }
  }
}"#,
            Operation::Milestones => r#"query Milestones($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    milestones(first: 100, after: $cursor, states: [OPEN, CLOSED], orderBy: {field: NUMBER, direction: ASC}) {
      pageInfo { hasNextPage endCursor }
      nodes { id number title state description dueOn }
    }
  }
}"#,
            Operation::CreateMilestone => r#"mutation CreateMilestone($repoId: ID!, $title: String!, $description: String, $dueOn: DateTime) {
  createMilestone(input: {repositoryId: $repoId, title: $title, description: $description, dueOn: $dueOn}) {
    milestone { id number }
  }
}"#,
            Operation::UpdateMilestone => r#"mutation UpdateMilestone($id: ID!, $title: String, $description: String, $dueOn: DateTime, $state: MilestoneState) {
  updateMilestone(input: {id: $id, title: $title, description: $description, dueOn: $dueOn, state: $state}) {
    milestone { id }
  }
}"#,
            Operation::Issues => r#"query Issues($owner: String!, $name: String!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    issues(first: 20, after: $cursor, states: [OPEN, CLOSED], orderBy: {field: CREATED_AT, direction: ASC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        id number title body state
        author { login }
        milestone { id number }
        labels(first: 100) { nodes { name } }
        comments(first: 100) {
          pageInfo { hasNextPage endCursor }
          nodes { author { login } body createdAt }
        }
      }
    }
  }
}"#,
            Operation::IssueComments => r#"query IssueComments($owner: String!, $name: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      comments(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes { author { login } body createdAt }
      }
    }
  }
}"#,
            Operation::CreateIssue => r#"mutation CreateIssue($repoId: ID!, $title: String!, $body: String, $labelIds: [ID!], $milestoneId: ID) {
  createIssue(input: {repositoryId: $repoId, title: $title, body: $body, labelIds: $labelIds, milestoneId: $milestoneId}) {
    issue { id number }
  }
}"#,
            Operation::UpdateIssue => r#"mutation UpdateIssue($id: ID!, $title: String, $state: IssueState, $labelIds: [ID!], $milestoneId: ID) {
  updateIssue(input: {id: $id, title: $title, state: $state, labelIds: $labelIds, milestoneId: $milestoneId}) {
    issue { id }
  }
}"#,
            Operation::AddComment => r#"mutation AddComment($subjectId: ID!, $body: String!) {
  addComment(input: {subjectId: $subjectId, body: $body}) {
    commentEdge { node { id } }
  }
}"#,
            Operation::CloseIssue => r#"mutation CloseIssue($issueId: ID!) {
  closeIssue(input: {issueId: $issueId}) { issue { id } }
}"#,
            Operation::Project => r#"query Project($owner: String!, $projectName: String!) {
  repositoryOwner(login: $owner) {
    ... on ProjectV2Owner {
      projectsV2(first: 20, query: $projectName) {
        nodes {
          id title
          fields(first: 100) {
            nodes {
              ... on ProjectV2FieldCommon { id name dataType }
              ... on ProjectV2IterationField {
                configuration {
                  duration
                  iterations { id title startDate duration }
                  completedIterations { id title startDate duration }
                }
              }
              ... on ProjectV2SingleSelectField { options { id name color description } }
            }
          }
        }
      }
    }
  }
}"#,
            Operation::CreateProject => r#"mutation CreateProject($ownerId: ID!, $title: String!) {
  createProjectV2(input: {ownerId: $ownerId, title: $title}) { projectV2 { id } }
}"#,
            Operation::CreateField => r#"mutation CreateField($input: CreateProjectV2FieldInput!) {
  createProjectV2Field(input: $input) {
    projectV2Field { ... on ProjectV2FieldCommon { id } }
  }
}"#,
            Operation::CreateIterationField => r#"mutation CreateIterationField($input: CreateProjectV2FieldInput!) {
  createProjectV2Field(input: $input) {
    projectV2Field { ... on ProjectV2IterationField { id } }
  }
}"#,
            Operation::ProjectItems => r#"query ProjectItems($projectId: ID!, $cursor: String) {
  node(id: $projectId) {
    ... on ProjectV2 {
      items(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          content {
            ... on Issue { id number repository { nameWithOwner } }
            ... on PullRequest { id number repository { nameWithOwner } }
          }
          fieldValues(first: 50) {
            nodes {
              __typename
              ... on ProjectV2ItemFieldTextValue { text field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldDateValue { date field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldNumberValue { number field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldSingleSelectValue { name field { ... on ProjectV2FieldCommon { name } } }
              ... on ProjectV2ItemFieldIterationValue { title field { ... on ProjectV2FieldCommon { name } } }
            }
          }
        }
      }
    }
  }
}"#,
            Operation::AddProjectItem => r#"mutation AddProjectItem($projectId: ID!, $contentId: ID!) {
  addProjectV2ItemById(input: {projectId: $projectId, contentId: $contentId}) { item { id } }
}"#,
            Operation::UpdateItemFieldValue => r#"mutation UpdateItemFieldValue($projectId: ID!, $itemId: ID!, $fieldId: ID!, $value: ProjectV2FieldValue!) {
  updateProjectV2ItemFieldValue(input: {projectId: $projectId, itemId: $itemId, fieldId: $fieldId, value: $value}) {
    projectV2Item { id }
  }
}"#,
        }
    }
}
