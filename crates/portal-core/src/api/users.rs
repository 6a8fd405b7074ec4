use urlencoding::encode;

use super::client::{ApiClient, RequestOptions};
use super::ApiError;
use crate::models::{
    DeleteUserResponse, DepartmentListResponse, GetDepartmentsParams, GetUsersParams,
    UpdateUserRequest, User, UserListResponse, YearsResponse,
};

impl ApiClient {
    pub async fn fetch_users(&self, params: &GetUsersParams) -> Result<UserListResponse, ApiError> {
        let options = RequestOptions::get()
            .query_opt("departmentId", params.department_id.as_deref())
            .query_opt("role", params.role.map(|r| r.as_str()))
            .query_opt("year", params.year)
            .query_opt("search", params.search.as_deref())
            .query_opt("page", params.page)
            .query_opt("pageSize", params.page_size);
        self.get_with("/users", options).await
    }

    pub async fn fetch_user(&self, user_id: &str) -> Result<User, ApiError> {
        self.get(&format!("/users/{}", encode(user_id))).await
    }

    pub async fn update_user(&self, user_id: &str, update: &UpdateUserRequest) -> Result<User, ApiError> {
        self.patch(&format!("/users/{}", encode(user_id)), update).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<Option<DeleteUserResponse>, ApiError> {
        self.delete(&format!("/users/{}", encode(user_id))).await
    }

    /// Departments for one year, the current year, or all years with `all`
    pub async fn fetch_departments(
        &self,
        params: &GetDepartmentsParams,
    ) -> Result<DepartmentListResponse, ApiError> {
        let options = RequestOptions::get()
            .query_opt("year", params.year)
            .query_opt("all", params.all.filter(|all| *all));
        self.get_with("/departments", options).await
    }

    pub async fn fetch_department_years(&self) -> Result<YearsResponse, ApiError> {
        self.get("/departments/years").await
    }
}
