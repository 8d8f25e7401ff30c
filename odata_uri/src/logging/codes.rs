//! Message keys and their classification metadata
//!
//! Every failure the resolver can produce carries a machine-stable message key.
//! The same key is used as the log code, so a logged event and the error returned
//! to the caller can be correlated without parsing formatted text.

use std::collections::HashMap;
use std::sync::OnceLock;

// ============================================================================
// CODE WRAPPER TYPE
// ============================================================================

/// Stable message key shared by errors and log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(&'static str);

impl Code {
    pub const fn new(code: &'static str) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ERROR CLASSIFICATION TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Complete metadata for a message key
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
    pub requires_halt: bool,
    pub description: &'static str,
    pub recommended_action: &'static str,
}

impl ErrorMetadata {
    pub const fn new(
        code: &'static str,
        category: &'static str,
        severity: Severity,
        recoverable: bool,
        requires_halt: bool,
        description: &'static str,
        recommended_action: &'static str,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            recoverable,
            requires_halt,
            description,
            recommended_action,
        }
    }
}

// ============================================================================
// MESSAGE KEYS
// ============================================================================

pub mod system {
    use super::Code;

    pub const INTERNAL_ERROR: Code = Code::new("ODataUri_InternalError");
    pub const INITIALIZATION_FAILURE: Code = Code::new("ODataUri_InitializationFailure");
}

/// Model loading and lookup
pub mod model {
    use super::Code;

    pub const INVALID_MODEL_DOCUMENT: Code = Code::new("EdmModel_InvalidModelDocument");
    pub const DUPLICATE_ELEMENT: Code = Code::new("EdmModel_DuplicateElementName");
    pub const UNKNOWN_TYPE_REFERENCE: Code = Code::new("EdmModel_UnknownTypeReference");
    pub const INVALID_KEY: Code = Code::new("EdmModel_InvalidKeyDeclaration");
    pub const CYCLIC_BASE_TYPE: Code = Code::new("EdmModel_CyclicBaseType");
}

/// Option-text lexing
pub mod lexical {
    use super::Code;

    pub const INVALID_CHARACTER: Code = Code::new("ExpressionLexer_InvalidCharacter");
    pub const UNTERMINATED_STRING: Code = Code::new("ExpressionLexer_UnterminatedStringLiteral");
    pub const INVALID_NUMBER: Code = Code::new("ExpressionLexer_InvalidNumericString");
    pub const UNBALANCED_BRACKETS: Code = Code::new("ExpressionLexer_UnbalancedBracketExpression");
    pub const IDENTIFIER_TOO_LONG: Code = Code::new("ExpressionLexer_IdentifierTooLong");
    pub const STRING_TOO_LARGE: Code = Code::new("ExpressionLexer_StringTooLarge");
    pub const TOO_MANY_TOKENS: Code = Code::new("ExpressionLexer_TooManyTokens");
    pub const SYNTAX_ERROR: Code = Code::new("ExpressionLexer_SyntaxError");
}

/// URI literal conversion
pub mod literal {
    use super::Code;

    pub const UNRECOGNIZED_LITERAL: Code = Code::new("UriQueryExpressionParser_UnrecognizedLiteral");
    pub const TYPE_VERIFICATION_FAILURE: Code =
        Code::new("ODataUriUtils_ConvertFromUriLiteralTypeVerificationFailure");
}

/// Resource path resolution
pub mod path {
    use super::Code;

    pub const EMPTY_SEGMENT: Code = Code::new("RequestUriProcessor_EmptySegmentInRequestUrl");
    pub const INCORRECT_BASE_URI: Code =
        Code::new("UriQueryPathParser_RequestUriDoesNotHaveTheCorrectBaseUri");
    pub const TOO_MANY_SEGMENTS: Code = Code::new("UriQueryPathParser_TooManySegments");
    pub const INVALID_ENCODING: Code = Code::new("RequestUriProcessor_InvalidPercentEncoding");
    pub const RESOURCE_NOT_FOUND: Code = Code::new("RequestUriProcessor_ResourceNotFound");
    pub const CANNOT_QUERY_COLLECTIONS: Code = Code::new("RequestUriProcessor_CannotQueryCollections");
    pub const TYPE_MUST_BE_RELATED: Code = Code::new("PathParser_TypeMustBeRelated");
    pub const MUST_BE_LEAF: Code = Code::new("RequestUriProcessor_MustBeLeafSegment");
    pub const COUNT_NOT_APPLICABLE: Code = Code::new("RequestUriProcessor_CountOnNonCollection");
    pub const REF_NOT_APPLICABLE: Code = Code::new("PathParser_EntityReferenceNotSupported");
    pub const VALUE_NOT_APPLICABLE: Code = Code::new("RequestUriProcessor_ValueSegmentNotApplicable");
    pub const KEY_NOT_APPLICABLE: Code = Code::new("RequestUriProcessor_KeyPredicateNotApplicable");
    pub const KEY_COUNT_MISMATCH: Code = Code::new("BadRequest_KeyCountMismatch");
    pub const KEY_MISMATCH: Code = Code::new("BadRequest_KeyMismatch");
    pub const SYNTAX_ERROR: Code = Code::new("RequestUriProcessor_SyntaxError");
    pub const PARAMETER_NOT_DECLARED: Code =
        Code::new("ODataParameterReaderCore_ParameterNameNotInMetadata");
}

/// Query string handling
pub mod query_options {
    use super::Code;

    pub const DUPLICATE_OPTION: Code = Code::new("QueryOptionUtils_QueryParameterMustBeSpecifiedOnce");
    pub const UNKNOWN_SYSTEM_OPTION: Code = Code::new("ODataUriParser_UnknownSystemQueryOption");
    pub const EMPTY_OPTION_NAME: Code = Code::new("ODataUriParser_EmptyQueryOptionName");
    pub const INVALID_TOP: Code = Code::new("ODataUriParser_InvalidTop");
    pub const INVALID_SKIP: Code = Code::new("ODataUriParser_InvalidSkip");
    pub const INVALID_COUNT: Code = Code::new("ODataUriParser_InvalidCount");
    pub const INVALID_ENCODING: Code = Code::new("ODataUriParser_InvalidPercentEncoding");
    pub const QUERY_TOO_LONG: Code = Code::new("ODataUriParser_QueryTooLong");
    pub const TOO_MANY_CUSTOM_OPTIONS: Code = Code::new("ODataUriParser_TooManyCustomOptions");
    pub const NOT_APPLICABLE: Code = Code::new("ODataUriParser_QueryOptionNotApplicable");
}

/// Static typing of opaque expressions
pub mod expression {
    use super::Code;

    pub const PROPERTY_NOT_DECLARED: Code = Code::new("MetadataBinder_PropertyNotDeclared");
    pub const UNKNOWN_FUNCTION: Code = Code::new("MetadataBinder_UnknownFunction");
    pub const ARGUMENT_COUNT_MISMATCH: Code = Code::new("MetadataBinder_FunctionArgumentCountMismatch");
    pub const INCOMPATIBLE_OPERANDS: Code = Code::new("MetadataBinder_IncompatibleOperandsError");
    pub const TOO_DEEP: Code = Code::new("UriQueryExpressionParser_TooDeep");
}

/// `$select` / `$expand`
pub mod select_expand {
    use super::Code;

    pub const TERM_NOT_VALID: Code = Code::new("UriSelectParser_TermIsNotValid");
    pub const NOT_NAVIGATION_OR_COMPLEX: Code =
        Code::new("ExpandItemBinder_PropertyIsNotANavigationPropertyOrComplexProperty");
    pub const MULTIPLE_NAVIGATIONS: Code =
        Code::new("ExpandItemBinder_TraversingMultipleNavPropsInTheSamePath");
    pub const NAVIGATION_NOT_LAST: Code = Code::new("SelectBinder_NavigationPropertyMustBeLastInSelectPath");
    pub const EXPAND_DEPTH_EXCEEDED: Code = Code::new("UriParser_ExpandDepthExceeded");
    pub const EXPAND_COUNT_EXCEEDED: Code = Code::new("UriParser_ExpandCountExceeded");
    pub const SELECT_COUNT_EXCEEDED: Code = Code::new("UriParser_SelectItemCountExceeded");
    pub const UNKNOWN_OPTION: Code = Code::new("UriSelectParser_UnknownNestedQueryOption");
    pub const DUPLICATE_OPTION: Code = Code::new("UriSelectParser_DuplicateNestedQueryOption");
    pub const OPTION_NOT_ALLOWED: Code = Code::new("UriSelectParser_SystemTokenInSelectExpand");
    pub const INVALID_LEVELS: Code = Code::new("UriSelectParser_InvalidLevelsOption");
    pub const INVALID_TOP: Code = Code::new("UriSelectParser_InvalidTopOption");
    pub const INVALID_SKIP: Code = Code::new("UriSelectParser_InvalidSkipOption");
    pub const INVALID_COUNT: Code = Code::new("UriSelectParser_InvalidCountOption");
    pub const CONTEXT_NOT_STRUCTURED: Code = Code::new("SelectExpandBinder_ContextTypeNotStructured");
    pub const OUTSIDE_APPLY_SHAPE: Code = Code::new("ApplyBinder_SelectPropertyNotInOutputShape");
}

/// `$apply`
pub mod apply {
    use super::Code;

    pub const UNRECOGNIZED_TRANSFORMATION: Code =
        Code::new("UriQueryExpressionParser_UnrecognizedTransformation");
    pub const WITH_EXPECTED: Code = Code::new("UriQueryExpressionParser_WithExpected");
    pub const AS_EXPECTED: Code = Code::new("UriQueryExpressionParser_AsExpected");
    pub const UNRECOGNIZED_METHOD: Code = Code::new("UriQueryExpressionParser_UnrecognizedWithMethod");
    pub const INCOMPATIBLE_METHOD: Code =
        Code::new("ApplyBinder_AggregateExpressionIncompatibleTypeForMethod");
    pub const DUPLICATE_ALIAS: Code = Code::new("ApplyBinder_DuplicateAlias");
    pub const GROUPBY_NOT_PROPERTY: Code = Code::new("ApplyBinder_GroupByPropertyNotPropertyAccessValue");
    pub const EXPAND_NOT_NAVIGATION: Code = Code::new("ApplyBinder_ExpandTransformationRequiresNavigation");
    pub const PROPERTY_NOT_IN_SHAPE: Code = Code::new("ApplyBinder_PropertyNotAvailableAfterTransformation");
    pub const TOO_MANY_TRANSFORMATIONS: Code = Code::new("ApplyBinder_TooManyTransformations");
    pub const TOO_MANY_AGGREGATES: Code = Code::new("ApplyBinder_TooManyAggregateStatements");
}

/// `$compute`
pub mod compute {
    use super::Code;

    pub const DUPLICATE_ALIAS: Code = Code::new("ComputeBinder_DuplicateAlias");
    pub const ALIAS_CONFLICTS: Code = Code::new("ComputeBinder_AliasConflictsWithProperty");
}

/// `@odata.context` URLs
pub mod context_url {
    use super::Code;

    pub const SOURCE_OR_TYPE_MISSING: Code =
        Code::new("ODataContextUriBuilder_NavigationSourceOrTypeNameMissingForResourceOrResourceSet");
    pub const TYPE_MISSING_FOR_COLLECTION: Code =
        Code::new("ODataContextUriBuilder_TypeNameMissingForTopLevelCollection");
    pub const TYPE_MISSING_FOR_PROPERTY: Code = Code::new("ODataContextUriBuilder_TypeNameMissingForProperty");
}

/// Derived-type constraints and payload type checks
pub mod validation {
    use super::Code;

    pub const TYPE_NOT_ALLOWED_BY_CONSTRAINT: Code =
        Code::new("ReaderValidationUtils_ValueTypeNotAllowedInDerivedTypeConstraint");
    pub const INCOMPATIBLE_TYPE: Code = Code::new("ValidationUtils_IncompatibleType");
    pub const UNRECOGNIZED_TYPE: Code = Code::new("ValidationUtils_UnrecognizedTypeName");
}

// ============================================================================
// SUCCESS CODE CONSTANTS
// ============================================================================

pub mod success {
    use super::Code;

    pub const OPERATION_COMPLETED_SUCCESSFULLY: Code = Code::new("I001");
    pub const SYSTEM_INITIALIZATION_COMPLETED: Code = Code::new("I004");
    pub const MODEL_LOADED: Code = Code::new("I005");

    pub const QUERY_OPTIONS_SPLIT: Code = Code::new("I010");
    pub const PATH_RESOLUTION_COMPLETE: Code = Code::new("I020");
    pub const SELECT_EXPAND_BINDING_COMPLETE: Code = Code::new("I030");
    pub const APPLY_BINDING_COMPLETE: Code = Code::new("I040");
    pub const COMPUTE_BINDING_COMPLETE: Code = Code::new("I045");
    pub const CONTEXT_URL_BUILT: Code = Code::new("I050");
    pub const URI_PARSE_COMPLETE: Code = Code::new("I060");
    pub const PAYLOAD_TYPE_VALIDATED: Code = Code::new("I070");
}

// ============================================================================
// ERROR METADATA REGISTRY
// ============================================================================

static ERROR_REGISTRY: OnceLock<HashMap<&'static str, ErrorMetadata>> = OnceLock::new();

const REGISTERED: &[ErrorMetadata] = &[
    // System
    ErrorMetadata::new(
        "ODataUri_InternalError",
        "System",
        Severity::Critical,
        false,
        true,
        "Internal resolver error",
        "File a bug report with the request URI",
    ),
    ErrorMetadata::new(
        "ODataUri_InitializationFailure",
        "System",
        Severity::Critical,
        false,
        true,
        "Logging or configuration initialization failed",
        "Check ODATA_* environment variables",
    ),
    // Model
    ErrorMetadata::new(
        "EdmModel_InvalidModelDocument",
        "Model",
        Severity::High,
        false,
        true,
        "Model document could not be read",
        "Check the JSON model document against the expected schema",
    ),
    ErrorMetadata::new(
        "EdmModel_DuplicateElementName",
        "Model",
        Severity::High,
        false,
        true,
        "Two model elements share one qualified name",
        "Rename one of the elements",
    ),
    ErrorMetadata::new(
        "EdmModel_UnknownTypeReference",
        "Model",
        Severity::High,
        false,
        true,
        "A model element refers to a type that is not declared",
        "Declare the type or fix the reference",
    ),
    ErrorMetadata::new(
        "EdmModel_InvalidKeyDeclaration",
        "Model",
        Severity::High,
        false,
        true,
        "An entity type key names a missing or non-primitive property",
        "Key properties must be declared primitive properties",
    ),
    ErrorMetadata::new(
        "EdmModel_CyclicBaseType",
        "Model",
        Severity::High,
        false,
        true,
        "A structured type derives from itself",
        "Break the base type chain",
    ),
    // Lexical
    ErrorMetadata::new(
        "ExpressionLexer_InvalidCharacter",
        "Lexical",
        Severity::Medium,
        true,
        false,
        "Character not valid in query option text",
        "Remove or percent-encode the character",
    ),
    ErrorMetadata::new(
        "ExpressionLexer_UnterminatedStringLiteral",
        "Lexical",
        Severity::Medium,
        true,
        false,
        "String literal is missing its closing quote",
        "Close the literal; embedded quotes are written as ''",
    ),
    ErrorMetadata::new(
        "ExpressionLexer_InvalidNumericString",
        "Lexical",
        Severity::Medium,
        true,
        false,
        "Numeric literal is malformed",
        "Check digits, decimal point and exponent",
    ),
    ErrorMetadata::new(
        "ExpressionLexer_UnbalancedBracketExpression",
        "Lexical",
        Severity::Medium,
        true,
        false,
        "Parentheses are not balanced",
        "Match every opening parenthesis with a closing one",
    ),
    ErrorMetadata::new(
        "ExpressionLexer_IdentifierTooLong",
        "Lexical",
        Severity::High,
        true,
        false,
        "Identifier exceeds the configured maximum length",
        "Shorten the identifier",
    ),
    ErrorMetadata::new(
        "ExpressionLexer_StringTooLarge",
        "Lexical",
        Severity::High,
        true,
        false,
        "String literal exceeds the configured maximum size",
        "Use a smaller literal",
    ),
    ErrorMetadata::new(
        "ExpressionLexer_TooManyTokens",
        "Lexical",
        Severity::High,
        true,
        false,
        "Query option text produced too many tokens",
        "Simplify the query option",
    ),
    ErrorMetadata::new(
        "ExpressionLexer_SyntaxError",
        "Lexical",
        Severity::Medium,
        true,
        false,
        "Unexpected token in query option text",
        "Check the option grammar near the reported position",
    ),
    // Literals
    ErrorMetadata::new(
        "UriQueryExpressionParser_UnrecognizedLiteral",
        "Literal",
        Severity::Medium,
        true,
        false,
        "Text is not a valid literal of the expected type",
        "Check the literal format",
    ),
    ErrorMetadata::new(
        "ODataUriUtils_ConvertFromUriLiteralTypeVerificationFailure",
        "Literal",
        Severity::Medium,
        true,
        false,
        "Literal cannot be converted to the declared type",
        "Use a literal compatible with the declared type",
    ),
    // Path
    ErrorMetadata::new(
        "RequestUriProcessor_EmptySegmentInRequestUrl",
        "Path",
        Severity::Medium,
        true,
        false,
        "Request path contains an empty segment",
        "Remove the duplicate '/'",
    ),
    ErrorMetadata::new(
        "UriQueryPathParser_RequestUriDoesNotHaveTheCorrectBaseUri",
        "Path",
        Severity::Medium,
        true,
        false,
        "Request URI is not under the service root",
        "Send the request to a URI below the configured service root",
    ),
    ErrorMetadata::new(
        "UriQueryPathParser_TooManySegments",
        "Path",
        Severity::High,
        true,
        false,
        "Request path exceeds the configured segment limit",
        "Shorten the request path",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_InvalidPercentEncoding",
        "Path",
        Severity::Medium,
        true,
        false,
        "Path segment is not valid percent-encoded UTF-8",
        "Fix the percent-encoding",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_ResourceNotFound",
        "Path",
        Severity::Medium,
        true,
        false,
        "Segment does not name a resource, member, type or operation",
        "Check the segment against the service metadata",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_CannotQueryCollections",
        "Path",
        Severity::Medium,
        true,
        false,
        "A collection cannot be traversed without a key or $count",
        "Add a key predicate or $count after the collection segment",
    ),
    ErrorMetadata::new(
        "PathParser_TypeMustBeRelated",
        "Path",
        Severity::Medium,
        true,
        false,
        "Type cast target is not the same as or derived from the current type",
        "Cast to a derived type of the current segment",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_MustBeLeafSegment",
        "Path",
        Severity::Medium,
        true,
        false,
        "Segment must be the last segment of the path",
        "Remove the trailing segments",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_CountOnNonCollection",
        "Path",
        Severity::Medium,
        true,
        false,
        "$count applies only to collections",
        "Remove $count or address a collection",
    ),
    ErrorMetadata::new(
        "PathParser_EntityReferenceNotSupported",
        "Path",
        Severity::Medium,
        true,
        false,
        "$ref applies only to entities and entity collections",
        "Remove $ref or address an entity",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_ValueSegmentNotApplicable",
        "Path",
        Severity::Medium,
        true,
        false,
        "$value applies only to single primitive values and media entities",
        "Remove $value",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_KeyPredicateNotApplicable",
        "Path",
        Severity::Medium,
        true,
        false,
        "Key predicate applied to a segment that is not a collection",
        "Remove the key predicate",
    ),
    ErrorMetadata::new(
        "BadRequest_KeyCountMismatch",
        "Path",
        Severity::Medium,
        true,
        false,
        "Number of key values does not match the entity key",
        "Supply every key property exactly once",
    ),
    ErrorMetadata::new(
        "BadRequest_KeyMismatch",
        "Path",
        Severity::Medium,
        true,
        false,
        "Named key value does not match a key property",
        "Use the key property names declared by the entity type",
    ),
    ErrorMetadata::new(
        "RequestUriProcessor_SyntaxError",
        "Path",
        Severity::Medium,
        true,
        false,
        "Path segment is malformed",
        "Check parentheses and separators in the segment",
    ),
    ErrorMetadata::new(
        "ODataParameterReaderCore_ParameterNameNotInMetadata",
        "Path",
        Severity::Medium,
        true,
        false,
        "Operation parameter is not declared",
        "Use the parameter names declared by the operation",
    ),
    // Query options
    ErrorMetadata::new(
        "QueryOptionUtils_QueryParameterMustBeSpecifiedOnce",
        "QueryOptions",
        Severity::Medium,
        true,
        false,
        "Query option appears more than once",
        "Specify each query option once",
    ),
    ErrorMetadata::new(
        "ODataUriParser_UnknownSystemQueryOption",
        "QueryOptions",
        Severity::Medium,
        true,
        false,
        "Unrecognized $-prefixed query option",
        "Remove the option or drop the $ prefix for custom options",
    ),
    ErrorMetadata::new(
        "ODataUriParser_EmptyQueryOptionName",
        "QueryOptions",
        Severity::Low,
        true,
        false,
        "Query option has an empty name",
        "Remove the stray '=' from the query string",
    ),
    ErrorMetadata::new(
        "ODataUriParser_InvalidTop",
        "QueryOptions",
        Severity::Medium,
        true,
        false,
        "$top must be a non-negative integer",
        "Fix the $top value",
    ),
    ErrorMetadata::new(
        "ODataUriParser_InvalidSkip",
        "QueryOptions",
        Severity::Medium,
        true,
        false,
        "$skip must be a non-negative integer",
        "Fix the $skip value",
    ),
    ErrorMetadata::new(
        "ODataUriParser_InvalidCount",
        "QueryOptions",
        Severity::Medium,
        true,
        false,
        "$count must be true or false",
        "Fix the $count value",
    ),
    ErrorMetadata::new(
        "ODataUriParser_InvalidPercentEncoding",
        "QueryOptions",
        Severity::Medium,
        true,
        false,
        "Query option is not valid percent-encoded UTF-8",
        "Fix the percent-encoding",
    ),
    ErrorMetadata::new(
        "ODataUriParser_QueryTooLong",
        "QueryOptions",
        Severity::High,
        true,
        false,
        "Query string exceeds the configured maximum length",
        "Shorten the query string",
    ),
    ErrorMetadata::new(
        "ODataUriParser_TooManyCustomOptions",
        "QueryOptions",
        Severity::High,
        true,
        false,
        "Too many custom query options",
        "Reduce the number of custom query options",
    ),
    ErrorMetadata::new(
        "ODataUriParser_QueryOptionNotApplicable",
        "QueryOptions",
        Severity::High,
        true,
        false,
        "Query option applied to a path that addresses no structured data",
        "Remove the option or address an entity set, entity or complex value",
    ),
    // Expressions
    ErrorMetadata::new(
        "MetadataBinder_PropertyNotDeclared",
        "Expression",
        Severity::Medium,
        true,
        false,
        "Expression refers to a property that is not declared",
        "Check the property name against the type",
    ),
    ErrorMetadata::new(
        "MetadataBinder_UnknownFunction",
        "Expression",
        Severity::Medium,
        true,
        false,
        "Unknown function in expression",
        "Use a built-in function or a namespace-qualified custom function",
    ),
    ErrorMetadata::new(
        "MetadataBinder_FunctionArgumentCountMismatch",
        "Expression",
        Severity::Medium,
        true,
        false,
        "Function called with the wrong number of arguments",
        "Check the function signature",
    ),
    ErrorMetadata::new(
        "MetadataBinder_IncompatibleOperandsError",
        "Expression",
        Severity::Medium,
        true,
        false,
        "Operator applied to incompatible operand types",
        "Convert the operands or use a different operator",
    ),
    ErrorMetadata::new(
        "UriQueryExpressionParser_TooDeep",
        "Expression",
        Severity::High,
        true,
        false,
        "Expression nesting exceeds the configured depth",
        "Flatten the expression",
    ),
    // Select / expand
    ErrorMetadata::new(
        "UriSelectParser_TermIsNotValid",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Select term is not valid",
        "Select properties, navigation properties, * or Namespace.*",
    ),
    ErrorMetadata::new(
        "ExpandItemBinder_PropertyIsNotANavigationPropertyOrComplexProperty",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Expand path does not end in a navigation property",
        "Expand navigation properties only",
    ),
    ErrorMetadata::new(
        "ExpandItemBinder_TraversingMultipleNavPropsInTheSamePath",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Expand path crosses more than one navigation property",
        "Use a nested $expand for the second navigation",
    ),
    ErrorMetadata::new(
        "SelectBinder_NavigationPropertyMustBeLastInSelectPath",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Select path continues past a navigation property",
        "Use $expand with a nested $select",
    ),
    ErrorMetadata::new(
        "UriParser_ExpandDepthExceeded",
        "SelectExpand",
        Severity::High,
        true,
        false,
        "$expand nesting exceeds the configured depth",
        "Reduce expand nesting",
    ),
    ErrorMetadata::new(
        "UriParser_ExpandCountExceeded",
        "SelectExpand",
        Severity::High,
        true,
        false,
        "Too many expanded items",
        "Reduce the number of expansions",
    ),
    ErrorMetadata::new(
        "UriParser_SelectItemCountExceeded",
        "SelectExpand",
        Severity::High,
        true,
        false,
        "Too many selected items",
        "Reduce the number of selected items",
    ),
    ErrorMetadata::new(
        "UriSelectParser_UnknownNestedQueryOption",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Unknown option inside expand or select options",
        "Use $select, $expand, $filter, $orderby, $top, $skip, $count, $search, $levels or $compute",
    ),
    ErrorMetadata::new(
        "UriSelectParser_DuplicateNestedQueryOption",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Nested option appears more than once",
        "Specify each nested option once",
    ),
    ErrorMetadata::new(
        "UriSelectParser_SystemTokenInSelectExpand",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Nested option not allowed for this kind of expansion",
        "$ref and $count expansions accept only filtering options",
    ),
    ErrorMetadata::new(
        "UriSelectParser_InvalidLevelsOption",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "$levels must be a positive integer or max",
        "Fix the $levels value",
    ),
    ErrorMetadata::new(
        "UriSelectParser_InvalidTopOption",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Nested $top must be a non-negative integer",
        "Fix the nested $top value",
    ),
    ErrorMetadata::new(
        "UriSelectParser_InvalidSkipOption",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Nested $skip must be a non-negative integer",
        "Fix the nested $skip value",
    ),
    ErrorMetadata::new(
        "UriSelectParser_InvalidCountOption",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "Nested $count must be true or false",
        "Fix the nested $count value",
    ),
    ErrorMetadata::new(
        "SelectExpandBinder_ContextTypeNotStructured",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "$select and $expand require an entity or complex context type",
        "Remove $select/$expand for primitive results",
    ),
    ErrorMetadata::new(
        "ApplyBinder_SelectPropertyNotInOutputShape",
        "SelectExpand",
        Severity::Medium,
        true,
        false,
        "$select names a property removed by $apply",
        "Select only grouped properties and aggregate or compute aliases",
    ),
    // Apply
    ErrorMetadata::new(
        "UriQueryExpressionParser_UnrecognizedTransformation",
        "Apply",
        Severity::Medium,
        true,
        false,
        "Unknown $apply transformation",
        "Use aggregate, groupby, filter, compute or expand",
    ),
    ErrorMetadata::new(
        "UriQueryExpressionParser_WithExpected",
        "Apply",
        Severity::Medium,
        true,
        false,
        "'with' expected in aggregate expression",
        "Write aggregate expressions as 'expr with method as Alias'",
    ),
    ErrorMetadata::new(
        "UriQueryExpressionParser_AsExpected",
        "Apply",
        Severity::Medium,
        true,
        false,
        "'as' expected before alias",
        "Give every aggregate or compute expression an alias",
    ),
    ErrorMetadata::new(
        "UriQueryExpressionParser_UnrecognizedWithMethod",
        "Apply",
        Severity::Medium,
        true,
        false,
        "Unknown aggregation method",
        "Use sum, min, max, average, countdistinct or a qualified custom method",
    ),
    ErrorMetadata::new(
        "ApplyBinder_AggregateExpressionIncompatibleTypeForMethod",
        "Apply",
        Severity::Medium,
        true,
        false,
        "Aggregation method does not accept the expression type",
        "sum and average require numeric expressions",
    ),
    ErrorMetadata::new(
        "ApplyBinder_DuplicateAlias",
        "Apply",
        Severity::Medium,
        true,
        false,
        "Alias introduced twice in the same $apply pipeline",
        "Use distinct aliases",
    ),
    ErrorMetadata::new(
        "ApplyBinder_GroupByPropertyNotPropertyAccessValue",
        "Apply",
        Severity::Medium,
        true,
        false,
        "Grouping path does not end in a property",
        "Group by properties or navigation paths ending in properties",
    ),
    ErrorMetadata::new(
        "ApplyBinder_ExpandTransformationRequiresNavigation",
        "Apply",
        Severity::Medium,
        true,
        false,
        "expand() transformation must name a navigation property",
        "Pass a navigation property as the first argument",
    ),
    ErrorMetadata::new(
        "ApplyBinder_PropertyNotAvailableAfterTransformation",
        "Apply",
        Severity::Medium,
        true,
        false,
        "Property was removed by an earlier transformation",
        "Reference only grouped properties or aliases after aggregate/groupby",
    ),
    ErrorMetadata::new(
        "ApplyBinder_TooManyTransformations",
        "Apply",
        Severity::High,
        true,
        false,
        "$apply pipeline exceeds the configured transformation count",
        "Shorten the pipeline",
    ),
    ErrorMetadata::new(
        "ApplyBinder_TooManyAggregateStatements",
        "Apply",
        Severity::High,
        true,
        false,
        "aggregate() has too many statements",
        "Split the aggregation",
    ),
    // Compute
    ErrorMetadata::new(
        "ComputeBinder_DuplicateAlias",
        "Compute",
        Severity::Medium,
        true,
        false,
        "$compute alias used twice",
        "Use distinct aliases",
    ),
    ErrorMetadata::new(
        "ComputeBinder_AliasConflictsWithProperty",
        "Compute",
        Severity::Medium,
        true,
        false,
        "$compute alias collides with a declared property",
        "Choose an alias that is not a property name",
    ),
    // Context URL
    ErrorMetadata::new(
        "ODataContextUriBuilder_NavigationSourceOrTypeNameMissingForResourceOrResourceSet",
        "ContextUrl",
        Severity::High,
        true,
        false,
        "Response needs a context URL but neither a navigation source nor a type name is known",
        "Provide a navigation source or an explicit type name",
    ),
    ErrorMetadata::new(
        "ODataContextUriBuilder_TypeNameMissingForTopLevelCollection",
        "ContextUrl",
        Severity::High,
        true,
        false,
        "Top-level collection response without an item type name",
        "Provide the collection item type",
    ),
    ErrorMetadata::new(
        "ODataContextUriBuilder_TypeNameMissingForProperty",
        "ContextUrl",
        Severity::High,
        true,
        false,
        "Property response without a type name",
        "Provide the property type or a type annotation",
    ),
    // Validation
    ErrorMetadata::new(
        "ReaderValidationUtils_ValueTypeNotAllowedInDerivedTypeConstraint",
        "Validation",
        Severity::Medium,
        true,
        false,
        "Type is not allowed by the derived-type constraint at this position",
        "Use the declared type or one listed in the constraint",
    ),
    ErrorMetadata::new(
        "ValidationUtils_IncompatibleType",
        "Validation",
        Severity::Medium,
        true,
        false,
        "Value type is not assignable to the declared type",
        "Use the declared type or one of its subtypes",
    ),
    ErrorMetadata::new(
        "ValidationUtils_UnrecognizedTypeName",
        "Validation",
        Severity::Medium,
        true,
        false,
        "Type name is not declared in the model",
        "Check the type name",
    ),
];

fn get_error_registry() -> &'static HashMap<&'static str, ErrorMetadata> {
    ERROR_REGISTRY.get_or_init(|| {
        REGISTERED
            .iter()
            .map(|metadata| (metadata.code, metadata.clone()))
            .collect()
    })
}

// ============================================================================
// CLASSIFICATION FUNCTIONS
// ============================================================================

pub fn get_error_metadata(code: &str) -> Option<&'static ErrorMetadata> {
    get_error_registry().get(code)
}

pub fn get_severity(code: &str) -> Severity {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.severity)
        .unwrap_or(Severity::Medium)
}

pub fn is_recoverable(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recoverable)
        .unwrap_or(true)
}

pub fn requires_halt(code: &str) -> bool {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.requires_halt)
        .unwrap_or(false)
}

pub fn get_description(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.description)
        .unwrap_or("Unknown error")
}

pub fn get_action(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.recommended_action)
        .unwrap_or("No specific action available")
}

pub fn get_category(code: &str) -> &'static str {
    get_error_registry()
        .get(code)
        .map(|metadata| metadata.category)
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_no_duplicate_keys() {
        assert_eq!(get_error_registry().len(), REGISTERED.len());
    }

    #[test]
    fn test_every_path_key_is_registered() {
        for code in [
            path::EMPTY_SEGMENT,
            path::INCORRECT_BASE_URI,
            path::CANNOT_QUERY_COLLECTIONS,
            path::TYPE_MUST_BE_RELATED,
            path::MUST_BE_LEAF,
            path::KEY_COUNT_MISMATCH,
            context_url::SOURCE_OR_TYPE_MISSING,
            validation::TYPE_NOT_ALLOWED_BY_CONSTRAINT,
        ] {
            assert!(
                get_error_metadata(code.as_str()).is_some(),
                "missing metadata for {}",
                code
            );
        }
    }

    #[test]
    fn test_classification_defaults_for_unknown_codes() {
        assert_eq!(get_category("NotARealKey"), "Unknown");
        assert_eq!(get_description("NotARealKey"), "Unknown error");
        assert!(is_recoverable("NotARealKey"));
        assert!(!requires_halt("NotARealKey"));
    }

    #[test]
    fn test_system_errors_halt() {
        assert_eq!(get_severity(system::INTERNAL_ERROR.as_str()), Severity::Critical);
        assert!(requires_halt(system::INTERNAL_ERROR.as_str()));
        assert_eq!(get_category(path::CANNOT_QUERY_COLLECTIONS.as_str()), "Path");
    }
}
